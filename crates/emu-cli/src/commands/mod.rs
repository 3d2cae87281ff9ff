use std::error::Error;

use emu_core::serde::to_canonical_json_bytes;
use serde::Serialize;

pub mod construct;
pub mod details;
pub mod evaluate;
pub mod partition;
pub mod threads;

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    let json = to_canonical_json_bytes(value).map_err(|err| Box::new(err) as Box<dyn Error>)?;
    println!("{}", String::from_utf8(json)?);
    Ok(())
}
