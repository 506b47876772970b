use crate::{create_test_cgroup, test_config, CG_ROOT};
use rustbox_cgroup::naming::CgroupName;
use rustbox_cgroup::testing::FakeCgroupFs;
use rustbox_cgroup::{Cgroup, CgroupConfig, CgroupError, CgroupState};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Snapshot of every path present under the fake mount
fn tree(fs: &FakeCgroupFs, name: &str) -> Vec<(PathBuf, Option<String>)> {
    let base = PathBuf::from(CG_ROOT).join(name);
    let mut entries = vec![
        (base.clone(), None),
        (base.join("runner"), None),
    ];
    for attr in ["cgroup.subtree_control", "cpuset.cpus", "cpuset.mems", "memory.max"] {
        entries.push((base.join(attr), fs.attribute(&base.join(attr))));
    }
    entries
        .into_iter()
        .filter(|(p, _)| fs.exists(p))
        .collect()
}

#[test]
fn test_full_lifecycle() {
    let (mut cg, fs) = create_test_cgroup(CgroupConfig {
        memory_limit_kb: Some(65536),
        cpus: Some("0".to_string()),
        ..test_config(1)
    });
    assert_eq!(cg.state(), CgroupState::Named);

    cg.prepare().expect("Failed to prepare cgroup");
    assert_eq!(cg.run_time_ms().unwrap(), 0);

    cg.enter().expect("Failed to enter cgroup");
    assert_eq!(cg.state(), CgroupState::Entered);
    assert_eq!(
        fs.attribute(Path::new("/sys/fs/cgroup/box-1/runner/cgroup.procs"))
            .as_deref(),
        Some("0\n")
    );

    // The sandboxed process has exited
    fs.set_attribute(Path::new("/sys/fs/cgroup/box-1/runner/cgroup.procs"), "");

    cg.stats().unwrap();
    cg.remove().expect("Failed to remove cgroup");
    assert_eq!(cg.state(), CgroupState::Removed);
    assert!(!fs.exists(Path::new("/sys/fs/cgroup/box-1")));
}

#[test]
fn test_prepare_remove_prepare_is_idempotent() {
    let (mut first, fs) = create_test_cgroup(CgroupConfig {
        cpus: Some("1-2".to_string()),
        ..test_config(6)
    });
    first.prepare().unwrap();
    let single = tree(&fs, "box-6");
    first.remove().unwrap();

    let mut second = Cgroup::with_fs(
        CgroupConfig {
            cpus: Some("1-2".to_string()),
            ..test_config(6)
        },
        fs.clone(),
    );
    second.init().unwrap();
    second.prepare().unwrap();

    assert_eq!(tree(&fs, "box-6"), single);
    assert_eq!(single.len(), 6);
}

#[test]
fn test_prepare_clears_stale_box() {
    let (mut cg, fs) = create_test_cgroup(test_config(3));

    // Leftover from a crashed run: box with an empty runner leaf
    fs.add_dir(Path::new("/sys/fs/cgroup/box-3"));
    fs.add_dir(Path::new("/sys/fs/cgroup/box-3/runner"));

    cg.prepare().expect("Stale cgroup should be reset");
    assert_eq!(cg.state(), CgroupState::Prepared);
    assert_eq!(
        fs.attribute(Path::new("/sys/fs/cgroup/box-3/cgroup.subtree_control"))
            .as_deref(),
        Some("+memory +cpu +cpuset")
    );
}

#[test]
fn test_prepare_clears_stale_box_without_leaf() {
    let (mut cg, fs) = create_test_cgroup(test_config(3));
    fs.add_dir(Path::new("/sys/fs/cgroup/box-3"));

    cg.prepare().unwrap();
    assert!(fs.exists(Path::new("/sys/fs/cgroup/box-3/runner")));
}

#[test]
fn test_prepare_fails_on_occupied_stale_leaf() {
    let (mut first, fs) = create_test_cgroup(test_config(8));
    first.prepare().unwrap();
    first.enter().unwrap();

    let mut second = Cgroup::with_fs(test_config(8), fs.clone());
    second.init().unwrap();
    let err = second.prepare().unwrap_err();
    assert!(matches!(err, CgroupError::Reset { .. }));
    assert!(err
        .to_string()
        .starts_with("Failed to reset control group /sys/fs/cgroup/box-8/runner"));
}

#[test]
fn test_remove_with_resident_process_fails() {
    let (mut cg, fs) = create_test_cgroup(test_config(2));
    cg.prepare().unwrap();
    cg.enter().unwrap();

    let err = cg.remove().unwrap_err();
    assert!(matches!(err, CgroupError::Remove { .. }));
    assert!(err
        .to_string()
        .starts_with("Cannot remove control group /sys/fs/cgroup/box-2/runner"));
    assert_eq!(cg.state(), CgroupState::Entered);
    assert!(fs.exists(Path::new("/sys/fs/cgroup/box-2/runner")));
}

#[test]
fn test_run_time_reported_from_cpu_stat() {
    let (mut cg, fs) = create_test_cgroup(test_config(4));
    cg.prepare().unwrap();
    fs.set_attribute(
        Path::new("/sys/fs/cgroup/box-4/cpu.stat"),
        "some_other_field 7\nusage_usec 2500\nanother 1\n",
    );
    assert_eq!(cg.run_time_ms().unwrap(), 2);

    fs.set_attribute(Path::new("/sys/fs/cgroup/box-4/cpu.stat"), "user_usec 10\n");
    assert_eq!(cg.run_time_ms().unwrap(), 0);
}

#[test]
fn test_run_time_before_prepare_rejected() {
    let (cg, _fs) = create_test_cgroup(test_config(4));
    assert!(matches!(
        cg.run_time_ms(),
        Err(CgroupError::InvalidState { .. })
    ));
}

#[test]
fn test_disabled_touches_nothing() {
    let fs = FakeCgroupFs::default();
    let mut cg = Cgroup::with_fs(
        CgroupConfig {
            enabled: false,
            memory_limit_kb: Some(1024),
            ..test_config(0)
        },
        fs.clone(),
    );

    cg.init().unwrap();
    cg.prepare().unwrap();
    cg.enter().unwrap();
    assert_eq!(cg.run_time_ms().unwrap(), 0);
    cg.stats().unwrap();
    cg.remove().unwrap();

    assert_eq!(fs.op_count(), 0);
    assert!(cg.name().is_none());
}

#[test]
fn test_parent_cgroup() {
    let fs = FakeCgroupFs::mounted(CG_ROOT);
    fs.add_dir(Path::new("/sys/fs/cgroup/isolate"));
    let mut cg = Cgroup::with_fs(
        CgroupConfig {
            parent: Some("isolate".to_string()),
            ..test_config(5)
        },
        fs.clone(),
    );
    cg.init().unwrap();
    cg.prepare().unwrap();

    let name = cg.name().unwrap();
    assert_eq!(name.name(), "isolate/box-5");
    assert_eq!(name.parent_name(), "isolate");
    assert!(fs.exists(Path::new("/sys/fs/cgroup/isolate/box-5/runner")));
}

#[test]
fn test_missing_parent_fails_create() {
    let (mut cg, _fs) = create_test_cgroup(CgroupConfig {
        parent: Some("absent".to_string()),
        ..test_config(5)
    });
    let err = cg.prepare().unwrap_err();
    assert!(matches!(err, CgroupError::Create { .. }));
}

#[test]
fn test_distinct_ids_have_disjoint_subtrees() {
    let root = Path::new(CG_ROOT);
    let mut seen = HashSet::new();
    let mut ids: Vec<u32> = (0..200).map(|_| fastrand::u32(0..1000)).collect();
    ids.extend([1, 10, 100]);
    ids.sort_unstable();
    ids.dedup();

    let paths: Vec<PathBuf> = ids
        .iter()
        .map(|&id| CgroupName::compute(id, None).attribute_path(root, ""))
        .collect();
    for path in &paths {
        assert!(seen.insert(path.clone()), "duplicate cgroup {}", path.display());
    }
    for a in &paths {
        for b in &paths {
            if a != b {
                assert!(!a.starts_with(b), "{} nested in {}", a.display(), b.display());
            }
        }
    }
}

#[test]
fn test_concurrent_boxes_share_mount() {
    let fs = FakeCgroupFs::mounted(CG_ROOT);
    let mut boxes: Vec<_> = (0..4)
        .map(|id| {
            let mut cg = Cgroup::with_fs(test_config(id), fs.clone());
            cg.init().unwrap();
            cg.prepare().unwrap();
            cg
        })
        .collect();

    boxes[1].remove().unwrap();
    assert!(fs.exists(Path::new("/sys/fs/cgroup/box-0/runner")));
    assert!(!fs.exists(Path::new("/sys/fs/cgroup/box-1")));
    for cg in boxes.iter_mut().filter(|cg| cg.state() == CgroupState::Prepared) {
        cg.remove().unwrap();
    }
}
