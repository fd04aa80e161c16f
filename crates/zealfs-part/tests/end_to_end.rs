//! Full round trip through the registry, the editor, and the ZealFS v2 engine against a
//! real image file on disk, instead of the in-memory device doubles the per-crate unit
//! tests use.

use zealfs_common::{FixedTimeSource, ZealTimestamp};
use zealfs_fs::Session;
use zealfs_io::{BlockDevice, ImageFile};
use zealfs_part::{Editor, Registry};

fn fixed_time() -> FixedTimeSource {
    FixedTimeSource(ZealTimestamp {
        year: 2026,
        month: 7,
        day: 30,
        weekday: 4,
        hour: 9,
        minute: 0,
        second: 0,
    })
}

#[test]
fn create_allocate_format_and_populate_a_partition() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");

    let mut registry = Registry::new();
    let index = registry.create_image(&path, 1 << 20, true).unwrap();
    registry.select(index, None);

    let partition_offset;
    {
        let disk = registry.current_disk_mut().unwrap();
        let mut editor = Editor::new(disk);
        let gap = editor.free_gap().expect("blank disk has a free gap");
        let (start_lba, available) = editor.max_partition_size(gap, 512);
        let slot = editor.allocate_partition(start_lba, available).unwrap();
        assert_eq!(slot, 0);

        let mut device = ImageFile::open(&path).unwrap();
        editor.write_changes(&mut device).unwrap();
        partition_offset = start_lba * 512;
    }

    // The on-disk header should carry the ZealFS v2 magic the instant write_changes
    // returns — no separate mkfs step is needed after allocate_partition.
    let mut probe_device = ImageFile::open(&path).unwrap();
    let mut header = [0u8; 7];
    probe_device.read(partition_offset, &mut header).unwrap();
    assert_eq!(header[0], b'Z');
    assert_eq!(header[1], 2);

    let device = ImageFile::open(&path).unwrap();
    let mut session = Session::new(device, partition_offset);
    let time = fixed_time();

    session.mkdir("/docs", &time).unwrap();
    let mut handle = session.create("/docs/readme.txt", &time).unwrap();
    session.write(&mut handle, b"hello from zealfs", 0).unwrap();
    session.flush(&handle).unwrap();

    let reopened = session.open("/docs/readme.txt").unwrap();
    let mut out = vec![0u8; b"hello from zealfs".len()];
    session.read(&reopened, &mut out, 0).unwrap();
    assert_eq!(&out, b"hello from zealfs");

    let dir_handle = session.opendir("/docs").unwrap();
    let entries = session.readdir(&dir_handle, 16).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "readme.txt");

    let report = session.df();
    assert!(report.used_bytes() > 0);
    assert!(report.free_bytes < report.total_bytes);
}

#[test]
fn revert_after_allocate_leaves_disk_unpartitioned() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");

    let mut registry = Registry::new();
    let index = registry.create_image(&path, 1 << 20, true).unwrap();
    registry.select(index, None);

    let disk = registry.current_disk_mut().unwrap();
    let mut editor = Editor::new(disk);
    let gap = editor.free_gap().unwrap();
    editor.allocate_partition(gap.0, gap.1).unwrap();
    assert!(editor.partitions()[0].is_active());

    editor.revert_changes();
    assert!(!editor.partitions()[0].is_active());
}
