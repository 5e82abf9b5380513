use stagewire::shared::fs_atomic::atomic_write_file;
use std::fs;

#[test]
fn shared_fs_atomic_creates_parents_and_replaces_content() {
    let temp = tempfile::tempdir().expect("tempdir");
    let target = temp.path().join("nested/output.json");

    atomic_write_file(&target, b"first").expect("write first");
    atomic_write_file(&target, b"second").expect("write second");
    assert_eq!(fs::read_to_string(&target).expect("read"), "second");

    let leftovers = fs::read_dir(target.parent().expect("parent"))
        .expect("read dir")
        .count();
    assert_eq!(leftovers, 1);
}
