use std::thread;
use std::time::Duration;

use emu_core::{EmuError, Observation};
use emu_dist::{LocalCluster, LocalTransport, Transport};

const TIMEOUT: Duration = Duration::from_secs(10);

#[test]
fn broadcast_scatter_gather_round_trip() {
    let results = LocalCluster::launch(4, TIMEOUT, |mut comm| {
        let rank = comm.rank();
        let greeting: String = comm.broadcast(if comm.is_coordinator() {
            Some("iteration-1".to_string())
        } else {
            None
        })?;
        let parts = comm
            .is_coordinator()
            .then(|| (0..comm.size()).map(|r| vec![r as u32; r + 1]).collect());
        let mine: Vec<u32> = comm.scatter(parts)?;
        assert_eq!(mine.len(), rank + 1);
        comm.barrier()?;
        let gathered = comm.gather((rank, mine.iter().sum::<u32>()))?;
        Ok((greeting, gathered))
    })
    .unwrap();

    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|(greeting, _)| greeting == "iteration-1"));
    assert_eq!(
        results[0].1,
        Some(vec![(0, 0), (1, 2), (2, 6), (3, 12)])
    );
    assert!(results[1..].iter().all(|(_, gathered)| gathered.is_none()));
}

#[test]
fn ranks_run_on_named_threads() {
    let names = LocalCluster::launch(3, TIMEOUT, |mut comm| {
        let name = std::thread::current().name().map(str::to_string);
        comm.barrier()?;
        Ok(name)
    })
    .unwrap();
    assert_eq!(
        names,
        vec![
            Some("emu-rank-0".to_string()),
            Some("emu-rank-1".to_string()),
            Some("emu-rank-2".to_string())
        ]
    );
}

#[test]
fn single_rank_collectives_are_local() {
    let out = LocalCluster::launch(1, TIMEOUT, |mut comm| {
        let value: u64 = comm.broadcast(Some(7))?;
        let part: u64 = comm.scatter(Some(vec![value + 1]))?;
        comm.barrier()?;
        Ok(comm.gather(part)?)
    })
    .unwrap();
    assert_eq!(out, vec![Some(vec![8])]);
}

#[test]
fn scatter_with_wrong_part_count_is_a_protocol_violation() {
    let err = LocalCluster::launch(2, TIMEOUT, |mut comm| {
        let parts = comm.is_coordinator().then(|| vec![1u8]);
        comm.scatter(parts)
    })
    .unwrap_err();
    assert_eq!(err.code(), "comm_protocol_violation");
}

#[test]
fn missing_peer_message_times_out() {
    let mut endpoints = LocalTransport::mesh(2, Duration::from_millis(50));
    let mut second = endpoints.pop().unwrap();
    let err = second.recv(0, 1).unwrap_err();
    assert_eq!(err.code(), "comm_timeout");
    drop(endpoints);
}

#[test]
fn observations_without_discrepancy_cross_ranks() {
    let observations = vec![
        Observation {
            data_idx: 1.0,
            value: 2.5,
            error: 0.1,
            md_var: None,
        },
        Observation {
            data_idx: 2.0,
            value: 3.0,
            error: 0.2,
            md_var: Some(0.04),
        },
    ];
    let received = LocalCluster::launch(3, TIMEOUT, |mut comm| {
        let value = comm.is_coordinator().then(|| observations.clone());
        comm.broadcast::<Vec<Observation>>(value)
    })
    .unwrap();
    assert!(received.iter().all(|copy| copy == &observations));
}

#[test]
fn workers_wait_for_a_slow_coordinator() {
    let out = LocalCluster::launch(3, Duration::from_millis(100), |mut comm| {
        if comm.is_coordinator() {
            thread::sleep(Duration::from_millis(400));
        }
        let value: u32 = comm.broadcast(comm.is_coordinator().then_some(7))?;
        comm.barrier()?;
        Ok(comm.gather(value + comm.rank() as u32)?)
    })
    .unwrap();
    assert_eq!(out[0], Some(vec![7, 8, 9]));
}

#[test]
fn silent_worker_is_reported_as_a_timeout() {
    let err = LocalCluster::launch(2, Duration::from_millis(100), |mut comm| {
        if comm.rank() == 1 {
            thread::sleep(Duration::from_millis(500));
        }
        comm.gather(comm.rank())?;
        Ok(())
    })
    .unwrap_err();
    assert_eq!(err.code(), "comm_timeout");
    assert_eq!(err.info().context.get("source").map(String::as_str), Some("1"));
}

#[test]
fn blocking_receive_ends_on_abort() {
    let mut endpoints = LocalTransport::mesh(2, Duration::from_millis(10));
    let mut second = endpoints.pop().unwrap();
    let first = endpoints.pop().unwrap();
    let sender = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        first.abort("coordinator failed");
    });
    let err = second.recv_blocking(0, 1).unwrap_err();
    assert_eq!(err.code(), "comm_peer_aborted");
    sender.join().unwrap();
}

#[test]
fn out_of_order_messages_are_stashed() {
    let mut endpoints = LocalTransport::mesh(2, TIMEOUT);
    let mut second = endpoints.pop().unwrap();
    let first = endpoints.pop().unwrap();
    first.send(1, 2, vec![2]).unwrap();
    first.send(1, 1, vec![1]).unwrap();
    assert_eq!(second.recv(0, 1).unwrap(), vec![1]);
    assert_eq!(second.recv(0, 2).unwrap(), vec![2]);
    assert_eq!(first.send(5, 1, vec![]).unwrap_err().code(), "comm_invalid_rank");
}

#[test]
fn failing_worker_aborts_the_coordinator() {
    let err = LocalCluster::launch(3, TIMEOUT, |mut comm| {
        if comm.rank() == 2 {
            return Err(EmuError::Numerical(emu_core::ErrorInfo::new(
                "numerical_singular",
                "synthetic failure",
            )));
        }
        comm.gather(comm.rank())?;
        Ok(())
    })
    .unwrap_err();
    assert_eq!(err.code(), "numerical_singular");
}

#[test]
fn panicking_rank_is_reported() {
    let err = LocalCluster::launch(2, TIMEOUT, |mut comm| {
        if comm.rank() == 1 {
            panic!("worker exploded");
        }
        comm.gather(0u8)?;
        Ok(())
    })
    .unwrap_err();
    assert_eq!(err.code(), "comm_rank_panicked");
    assert!(err.to_string().contains("worker exploded"));
}

#[test]
fn empty_cluster_is_rejected() {
    let err = LocalCluster::launch(0, TIMEOUT, |_comm| Ok(())).unwrap_err();
    assert_eq!(err.code(), "comm_no_ranks");
}
