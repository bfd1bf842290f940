//! Integration tests for concurrent use of one mounted filesystem

mod common;

use std::thread;

use ::common::fs::{read_all, write_all_bytes, ErrorKind};

#[test]
fn test_parallel_writers() {
    let env = common::setup_test_env();
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let fs = env.fs.clone();
            thread::spawn(move || {
                let dir = format!("/t{t}");
                fs.create_directory(&dir).unwrap();
                for i in 0..5 {
                    let data = common::data(t * 37 + i * 11 + 1);
                    write_all_bytes(&fs, &format!("{dir}/f{i}"), &data).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(env.fs.list("/").unwrap().len(), 8);
    for t in 0..8 {
        for i in 0..5 {
            let path = format!("/t{t}/f{i}");
            assert_eq!(read_all(&env.fs, &path).unwrap(), common::data(t * 37 + i * 11 + 1));
        }
    }

    // the interleaved log replays to the same tree
    let expected = env.fs.snapshot();
    env.fs.shutdown().unwrap();
    assert_eq!(env.remount().unwrap().snapshot(), expected);
}

#[test]
fn test_racing_creates() {
    let env = common::setup_test_env();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let fs = env.fs.clone();
            thread::spawn(move || fs.write_open("/same").map(|writer| writer.close()))
        })
        .collect();

    let mut won = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(closed) => {
                closed.unwrap();
                won += 1;
            }
            Err(err) => assert_eq!(err.kind(), ErrorKind::AlreadyExists),
        }
    }
    assert_eq!(won, 1);
}

#[test]
fn test_mkdir_races_are_idempotent() {
    let env = common::setup_test_env();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let fs = env.fs.clone();
            thread::spawn(move || fs.create_directory("/shared/deep/dir").unwrap())
        })
        .collect();
    let infos: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(infos.iter().all(|info| *info == infos[0]));
    assert_eq!(env.fs.list("/shared/deep").unwrap().len(), 1);
}
