use std::collections::HashMap;
use std::sync::Arc;
use index_upgrader::index::deletion_policy::{KeepAllCommitsPolicy, KeepOnlyLastCommitPolicy};
use index_upgrader::index::detector;
use index_upgrader::index::{Generation, IndexFileDeleter, SegmentInfo, SegmentInfos};
use index_upgrader::store::{Directory, RamDirectory};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn write_segment(dir: &RamDirectory, name: &str) -> SegmentInfo {
    let files: Vec<String> = ["fnm", "tis", "frq"].iter().map(|ext| format!("{}.{}", name, ext)).collect();
    for file in &files {
        dir.write_file(file, vec![7; 16]).unwrap();
    }
    SegmentInfo::new(name, 4, files)
}

#[test]
fn balanced_ref_counts_delete_every_file_exactly_once() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..20 {
        let dir = Arc::new(RamDirectory::new());
        let deleter = IndexFileDeleter::open(dir.clone(), Box::new(KeepAllCommitsPolicy), None).unwrap();

        let names: Vec<String> = (0..12).map(|i| format!("_{}.frq", i)).collect();
        for name in &names {
            dir.write_file(name, vec![1]).unwrap();
        }
        let mut outstanding: HashMap<String, u32> = HashMap::new();
        for _ in 0..200 {
            let name = names[rng.gen_range(0..names.len())].clone();
            let held = outstanding.get(&name).copied().unwrap_or(0);
            if held > 0 && rng.gen_bool(0.45) {
                deleter.dec_ref(std::slice::from_ref(&name)).unwrap();
                outstanding.insert(name.clone(), held - 1);
                if held == 1 {
                    assert!(!dir.file_exists(&name));
                }
            } else if dir.file_exists(&name) {
                deleter.inc_ref(std::slice::from_ref(&name)).unwrap();
                *outstanding.entry(name.clone()).or_insert(0) += 1;
            }
        }
        for (name, held) in &outstanding {
            for _ in 0..*held {
                deleter.dec_ref(std::slice::from_ref(name)).unwrap();
            }
        }
        for name in names.iter().filter(|n| outstanding.contains_key(*n)) {
            assert_eq!(deleter.ref_count(name), 0);
            assert!(!dir.file_exists(name));
            assert_eq!(dir.deletions_of(name), 1);
        }
    }
}

#[test]
fn live_commits_keep_their_files() {
    let dir = Arc::new(RamDirectory::new());
    let mut infos = SegmentInfos::new(Generation::V3);
    infos.segments.push(write_segment(&dir, "_0"));
    infos.commit(dir.as_ref()).unwrap();
    let deleter = IndexFileDeleter::open(dir.clone(), Box::new(KeepAllCommitsPolicy), Some(&infos)).unwrap();

    for i in 1..5 {
        infos.segments = vec![write_segment(&dir, &format!("_{}", i))];
        deleter.checkpoint(&infos, false).unwrap();
        infos.commit(dir.as_ref()).unwrap();
        deleter.checkpoint(&infos, true).unwrap();
    }
    deleter.close().unwrap();
    // every commit is still live, so nothing may go
    for i in 0..5 {
        assert!(dir.file_exists(&format!("_{}.tis", i)));
    }
    assert_eq!(deleter.commit_generations(), vec![1, 2, 3, 4, 5]);
}

#[test]
fn keep_only_last_leaves_one_commit() {
    let dir = Arc::new(RamDirectory::new());
    let mut infos = SegmentInfos::new(Generation::V4);
    infos.segments.push(write_segment(&dir, "_0"));
    infos.commit(dir.as_ref()).unwrap();
    let deleter = IndexFileDeleter::open(dir.clone(), Box::new(KeepOnlyLastCommitPolicy), Some(&infos)).unwrap();

    infos.segments.push(write_segment(&dir, "_1"));
    deleter.checkpoint(&infos, false).unwrap();
    infos.commit(dir.as_ref()).unwrap();
    deleter.checkpoint(&infos, true).unwrap();
    deleter.close().unwrap();

    assert_eq!(deleter.commit_generations(), vec![2]);
    assert!(!dir.file_exists("segments_1"));
    // _0 is shared by both commits and survives
    assert!(dir.file_exists("_0.tis"));
    assert_eq!(detector::detect(dir.as_ref()).unwrap(), Generation::V4);
}

#[test]
fn detection_is_deterministic() {
    for generation in Generation::ALL {
        let dir = RamDirectory::new();
        let mut infos = SegmentInfos::new(generation);
        infos.segments.push(write_segment(&dir, "_0"));
        infos.commit(&dir).unwrap();
        let before = dir.list_all().unwrap();
        let first = detector::detect(&dir).unwrap();
        let second = detector::detect(&dir).unwrap();
        assert_eq!(first, generation);
        assert_eq!(first, second);
        assert_eq!(dir.list_all().unwrap(), before);
    }
}
