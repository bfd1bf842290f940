//! Integration tests for segmented writes and reads

mod common;

use std::io::{Read, Seek, SeekFrom, Write};

use ::common::fs::{read_all, write_all_bytes, ErrorKind};

use crate::common::PAYLOAD;

#[test]
fn test_segmented_write_read() {
    let env = common::setup_test_env();
    let data = common::data(PAYLOAD * 15 + 17);

    let mut writer = env.fs.write_open("/big.bin").unwrap();
    let mut offset = 0;
    for (i, chunk) in [1usize, 3, 64, 65, 100, 7, 500].iter().cycle().enumerate() {
        if offset == data.len() {
            break;
        }
        let end = (offset + chunk).min(data.len());
        writer.write_all(&data[offset..end]).unwrap();
        offset = end;
        assert!(i < 1000);
    }
    assert_eq!(writer.close().unwrap(), data.len() as u64);

    let info = env.fs.stat("/big.bin").unwrap();
    assert!(info.is_file);
    assert_eq!(info.size, data.len() as u64);
    assert_eq!(env.segment_paths().len(), 16);

    for size in [1usize, 5, PAYLOAD - 1, PAYLOAD, PAYLOAD + 1, 1000, 8192] {
        let mut reader = env.fs.read_open("/big.bin").unwrap();
        let mut out = Vec::new();
        let mut buf = vec![0u8; size];
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, data, "buffer size {size}");
        // past the end stays at zero bytes
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }
}

#[test]
fn test_empty_file() {
    let env = common::setup_test_env();
    let writer = env.fs.write_open("/empty").unwrap();
    assert_eq!(writer.close().unwrap(), 0);

    assert_eq!(env.fs.stat("/empty").unwrap().size, 0);
    assert!(read_all(&env.fs, "/empty").unwrap().is_empty());
    assert!(env.segment_paths().is_empty());
}

#[test]
fn test_flush_seals_partial_segment() {
    let env = common::setup_test_env();
    let mut writer = env.fs.write_open("/f").unwrap();
    writer.write_all(b"hello ").unwrap();
    writer.flush().unwrap();
    // nothing pending, so this is a no-op
    writer.flush().unwrap();
    assert_eq!(env.fs.stat("/f").unwrap().size, 6);

    writer.write_all(b"world").unwrap();
    writer.close().unwrap();

    assert_eq!(env.segment_paths().len(), 2);
    assert_eq!(read_all(&env.fs, "/f").unwrap(), b"hello world");
}

#[test]
fn test_dropped_writer_loses_pending_bytes() {
    let env = common::setup_test_env();
    let data = common::data(PAYLOAD + 10);
    {
        let mut writer = env.fs.write_open("/f").unwrap();
        writer.write_all(&data).unwrap();
        writer.write_all(b"x").unwrap();
    }
    // the full segment was sealed once more bytes arrived, the rest is gone
    assert_eq!(env.fs.stat("/f").unwrap().size, PAYLOAD as u64);
    assert_eq!(read_all(&env.fs, "/f").unwrap(), data[..PAYLOAD].to_vec());
}

#[test]
fn test_write_open_rules() {
    let env = common::setup_test_env();
    write_all_bytes(&env.fs, "/a", b"1").unwrap();

    let exists = env.fs.write_open("/a").unwrap_err();
    assert_eq!(exists.kind(), ErrorKind::AlreadyExists);

    let missing = env.fs.write_open("/nope/a").unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotFound);

    let through_file = env.fs.write_open("/a/b").unwrap_err();
    assert_eq!(through_file.kind(), ErrorKind::NotADirectory);

    let relative = env.fs.write_open("a").unwrap_err();
    assert_eq!(relative.kind(), ErrorKind::InvalidArgument);

    let read_dir = env.fs.read_open("/").unwrap_err();
    assert_eq!(read_dir.kind(), ErrorKind::IsADirectory);
}

#[test]
fn test_seek() {
    let env = common::setup_test_env();
    let data = common::data(PAYLOAD * 3 + 5);
    write_all_bytes(&env.fs, "/f", &data).unwrap();

    let mut reader = env.fs.read_open("/f").unwrap();
    let mut buf = [0u8; 10];

    reader.seek(SeekFrom::Start(130)).unwrap();
    reader.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, &data[130..140]);

    // back into the same segment, then into an earlier one
    reader.seek(SeekFrom::Current(-5)).unwrap();
    reader.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, &data[135..145]);
    reader.seek(SeekFrom::Start(3)).unwrap();
    reader.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, &data[3..13]);

    let end = reader.seek(SeekFrom::End(-5)).unwrap();
    assert_eq!(end, data.len() as u64 - 5);
    let mut tail = Vec::new();
    reader.read_to_end(&mut tail).unwrap();
    assert_eq!(tail, data[data.len() - 5..].to_vec());

    assert_eq!(reader.seek(SeekFrom::End(0)).unwrap(), data.len() as u64);
    let err = reader.seek(SeekFrom::End(1)).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    let err = reader.seek(SeekFrom::Current(-1000)).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
}

#[test]
fn test_reader_sees_file_as_opened() {
    let env = common::setup_test_env();
    let mut writer = env.fs.write_open("/f").unwrap();
    writer.write_all(&common::data(PAYLOAD)).unwrap();
    writer.flush().unwrap();

    let reader = env.fs.read_open("/f").unwrap();
    writer.write_all(b"more").unwrap();
    writer.close().unwrap();

    assert_eq!(reader.size(), PAYLOAD as u64);
    assert_eq!(env.fs.stat("/f").unwrap().size, PAYLOAD as u64 + 4);
}

#[test]
fn test_copy_from_reader() {
    let env = common::setup_test_env();
    let data = common::data(1000);
    let written = ::common::fs::write_all(&env.fs, "/copy", std::io::Cursor::new(&data)).unwrap();
    assert_eq!(written, 1000);
    assert_eq!(read_all(&env.fs, "/copy").unwrap(), data);
}
