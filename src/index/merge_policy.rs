use std::collections::HashSet;
use log::debug;
use crate::core::config::MergePolicyConfig;
use crate::core::error::Result;
use crate::index::commit::SegmentInfo;
use crate::index::generation::Generation;
use crate::store::directory::Directory;

/// What a merge policy knows about one segment
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentStats {
    pub name: String,
    pub size_bytes: u64,
    pub max_doc: u32,
    pub del_count: u32,
    /// Layout the segment's files are written in
    pub generation: Generation,
}

impl SegmentStats {
    pub fn collect(dir: &dyn Directory, info: &SegmentInfo, generation: Generation) -> Result<Self> {
        Ok(SegmentStats {
            name: info.name.clone(),
            size_bytes: info.size_in_bytes(dir)?,
            max_doc: info.max_doc,
            del_count: info.del_count,
            generation,
        })
    }

    fn del_ratio(&self) -> f64 {
        if self.max_doc == 0 { 0.0 } else { self.del_count.min(self.max_doc) as f64 / self.max_doc as f64 }
    }

    /// Bytes the segment will still occupy once its deletions are dropped
    fn live_bytes(&self) -> u64 {
        (self.size_bytes as f64 * (1.0 - self.del_ratio())) as u64
    }

    fn needs_rewrite(&self, target: Generation) -> bool {
        self.generation != target || self.del_count > 0
    }
}

/// Segments merged together into one new segment, by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneMerge {
    pub segments: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSpecification {
    pub merges: Vec<OneMerge>,
}

impl MergeSpecification {
    fn add(&mut self, segments: &[&SegmentStats]) {
        self.merges.push(OneMerge { segments: segments.iter().map(|s| s.name.clone()).collect() });
    }

    fn into_option(self) -> Option<Self> {
        if self.merges.is_empty() { None } else { Some(self) }
    }
}

/// Policy for deciding which segments to merge
pub trait MergePolicy: Send + Sync {
    /// Merges worth running to keep the segment count in check; None when the
    /// index is fine as is
    fn find_merges(&self, segments: &[SegmentStats]) -> Option<MergeSpecification>;

    /// Merges needed to bring the index down to `max_segment_count` segments,
    /// all written in `target` without deletions. Call again after running the
    /// returned merges until it yields None.
    fn find_forced_merges(
        &self,
        segments: &[SegmentStats],
        max_segment_count: usize,
        target: Generation,
    ) -> Option<MergeSpecification>;
}

/// Tiered merge policy: merges segments of roughly equal size, favoring
/// merges that reclaim deletions, while capping merged segment size
#[derive(Debug, Clone)]
pub struct TieredMergePolicy {
    pub max_merge_at_once: usize,
    pub max_merge_at_once_explicit: usize,
    pub segments_per_tier: f64,
    pub floor_segment_bytes: u64,
    pub max_merged_segment_bytes: u64,
    pub reclaim_deletes_weight: f64,
}

impl Default for TieredMergePolicy {
    fn default() -> Self {
        Self::from_config(&MergePolicyConfig::default())
    }
}

impl TieredMergePolicy {
    pub fn from_config(config: &MergePolicyConfig) -> Self {
        TieredMergePolicy {
            max_merge_at_once: config.max_merge_at_once.max(2),
            max_merge_at_once_explicit: config.max_merge_at_once_explicit.max(2),
            segments_per_tier: config.segments_per_tier.max(2.0),
            floor_segment_bytes: config.floor_segment_bytes.max(1),
            max_merged_segment_bytes: config.max_merged_segment_bytes,
            reclaim_deletes_weight: config.reclaim_deletes_weight,
        }
    }

    fn floor_size(&self, bytes: u64) -> u64 {
        bytes.max(self.floor_segment_bytes)
    }

    /// Segment count the index may hold before natural merges kick in
    fn allowed_segment_count(&self, eligible: &[&SegmentStats]) -> usize {
        let total: u64 = eligible.iter().map(|s| s.live_bytes()).sum();
        let min_bytes = eligible.iter().map(|s| s.live_bytes()).min().unwrap_or(0);

        let mut level_size = self.floor_size(min_bytes) as f64;
        let mut bytes_left = total as f64;
        let mut allowed = 0.0;
        loop {
            let level_count = bytes_left / level_size;
            if level_count < self.segments_per_tier {
                allowed += level_count.ceil();
                break;
            }
            allowed += self.segments_per_tier;
            bytes_left -= self.segments_per_tier * level_size;
            level_size *= self.max_merge_at_once as f64;
        }
        allowed as usize
    }

    /// Lower is better: balanced merges that reclaim deletions score low
    fn score(&self, candidate: &[&SegmentStats], hit_too_large: bool) -> f64 {
        let before: u64 = candidate.iter().map(|s| s.size_bytes).sum();
        let after: u64 = candidate.iter().map(|s| s.live_bytes()).sum();
        let after_floored: u64 = candidate.iter().map(|s| self.floor_size(s.live_bytes())).sum();

        let skew = if hit_too_large {
            1.0 / self.max_merge_at_once as f64
        } else {
            self.floor_size(candidate[0].live_bytes()) as f64 / after_floored.max(1) as f64
        };
        let mut score = skew * (after as f64).powf(0.05);
        let non_del_ratio = if before == 0 { 1.0 } else { after as f64 / before as f64 };
        score *= non_del_ratio.powf(self.reclaim_deletes_weight);
        score
    }
}

/// Largest first; ties broken by name so results are deterministic
fn sorted_by_size<'a>(segments: &'a [SegmentStats], size: impl Fn(&SegmentStats) -> u64) -> Vec<&'a SegmentStats> {
    let mut sorted: Vec<&SegmentStats> = segments.iter().collect();
    sorted.sort_by(|a, b| size(b).cmp(&size(a)).then_with(|| a.name.cmp(&b.name)));
    sorted
}

impl MergePolicy for TieredMergePolicy {
    fn find_merges(&self, segments: &[SegmentStats]) -> Option<MergeSpecification> {
        let sorted = sorted_by_size(segments, SegmentStats::live_bytes);
        let too_big = sorted
            .iter()
            .take_while(|s| s.live_bytes() >= self.max_merged_segment_bytes / 2)
            .count();
        let candidates = &sorted[too_big..];
        let allowed = self.allowed_segment_count(candidates);

        let mut plan = MergeSpecification::default();
        let mut merging: HashSet<&str> = HashSet::new();
        loop {
            let eligible: Vec<&SegmentStats> =
                candidates.iter().copied().filter(|s| !merging.contains(s.name.as_str())).collect();
            if eligible.len() <= allowed {
                break;
            }

            let mut best: Option<(f64, Vec<&SegmentStats>)> = None;
            let last_start = eligible.len().saturating_sub(self.max_merge_at_once);
            for start in 0..=last_start {
                let mut candidate = Vec::new();
                let mut merged_bytes = 0u64;
                let mut hit_too_large = false;
                for segment in &eligible[start..] {
                    if candidate.len() >= self.max_merge_at_once {
                        break;
                    }
                    let bytes = segment.live_bytes();
                    if merged_bytes + bytes > self.max_merged_segment_bytes {
                        hit_too_large = true;
                        continue;
                    }
                    candidate.push(*segment);
                    merged_bytes += bytes;
                }
                if candidate.len() < 2 {
                    continue;
                }
                let score = self.score(&candidate, hit_too_large);
                if best.as_ref().is_none_or(|(best_score, _)| score < *best_score) {
                    best = Some((score, candidate));
                }
            }

            match best {
                Some((score, candidate)) => {
                    debug!("tiered merge of {} segments, score {:.3}", candidate.len(), score);
                    merging.extend(candidate.iter().map(|s| s.name.as_str()));
                    plan.add(&candidate);
                }
                None => break,
            }
        }
        plan.into_option()
    }

    fn find_forced_merges(
        &self,
        segments: &[SegmentStats],
        max_segment_count: usize,
        target: Generation,
    ) -> Option<MergeSpecification> {
        let max_segment_count = max_segment_count.max(1);
        if segments.len() <= max_segment_count && !segments.iter().any(|s| s.needs_rewrite(target)) {
            return None;
        }

        let sorted = sorted_by_size(segments, |s| s.size_bytes);
        let explicit = self.max_merge_at_once_explicit;
        let mut plan = MergeSpecification::default();
        let mut end = sorted.len();
        while end >= explicit + max_segment_count - 1 {
            plan.add(&sorted[end - explicit..end]);
            end -= explicit;
        }

        if plan.merges.is_empty() {
            if end >= max_segment_count + 1 {
                let count = end - max_segment_count + 1;
                plan.add(&sorted[end - count..end]);
            } else {
                // few enough segments already: rewrite the stale ones alone
                for segment in sorted.iter().filter(|s| s.needs_rewrite(target)) {
                    plan.add(&[*segment]);
                }
            }
        }
        debug!(
            "forced merge to {} segments: {} merges over {} segments",
            max_segment_count,
            plan.merges.len(),
            segments.len()
        );
        plan.into_option()
    }
}
