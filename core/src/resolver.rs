// Identification resolver
//
// Staged search over (file-system kind x block geometry). Every registered
// probe is swept against every candidate volume at increasing confidence
// levels; views are synthesized on the way (clustered when a probe wants
// larger blocks, padded when a probe sees a bigger volume than the image
// holds) and the candidate set narrows each round.

use crate::error::{RelicError, Result};
use crate::filesystem::FileSystem;
use crate::probe::{FsKind, Probe, ProbeLevel, ProbeReport};
use crate::registry::FilesystemRegistry;
use crate::volume::{pad_to, ClusteredVolume, Volume};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Outcome of a successful identification.
#[derive(Debug, Clone)]
pub struct Identification {
    pub kind: FsKind,
    /// Final view, including any clustering and padding applied.
    pub volume: Arc<dyn Volume>,
    /// Highest level the winner passed.
    pub level: ProbeLevel,
    /// Last size estimate in blocks, if the probe ever gave one.
    pub size: Option<u64>,
    /// Resolved because a single candidate remained, not by tie-break.
    pub unique: bool,
    /// Candidates still standing in the final round.
    pub contenders: usize,
}

#[derive(Clone)]
struct Candidate {
    probe: Arc<dyn Probe>,
    volume: Arc<dyn Volume>,
    size: Option<u64>,
    kind: FsKind,
}

impl Candidate {
    fn new(probe: &Arc<dyn Probe>, volume: Arc<dyn Volume>, kind: FsKind) -> Self {
        Self {
            probe: Arc::clone(probe),
            volume,
            size: None,
            kind,
        }
    }

    /// Re-run the probe at `level`; `None` if it no longer passes.
    fn advance(&self, level: ProbeLevel) -> Option<Candidate> {
        let report = evaluate(self.probe.as_ref(), self.volume.as_ref(), level);
        if !report.passed {
            return None;
        }
        let volume = match report.size {
            Some(size) => pad_to(Arc::clone(&self.volume), size),
            None => Arc::clone(&self.volume),
        };
        Some(Candidate {
            probe: Arc::clone(&self.probe),
            volume,
            size: report.size.or(self.size),
            kind: report.kind,
        })
    }

    /// Bytes this interpretation claims.
    fn extent(&self) -> u64 {
        let blocks = self.size.unwrap_or_else(|| self.volume.block_count());
        self.volume.block_size() as u64 * blocks
    }

    fn into_identification(
        self,
        level: ProbeLevel,
        unique: bool,
        contenders: usize,
    ) -> Identification {
        let volume = match self.size {
            Some(size) => pad_to(self.volume, size),
            None => self.volume,
        };
        Identification {
            kind: self.kind,
            volume,
            level,
            size: self.size,
            unique,
            contenders,
        }
    }
}

/// Run one probe; an error counts as a failed check.
fn evaluate(probe: &dyn Probe, volume: &dyn Volume, level: ProbeLevel) -> ProbeReport {
    match probe.probe(Some(volume), level) {
        Ok(report) => {
            trace!(
                kind = %report.kind,
                level = %level,
                passed = report.passed,
                size = ?report.size,
                view = %volume.info(),
                "probe"
            );
            report
        }
        Err(e) => {
            debug!(kind = %probe.family(), level = %level, "probe error treated as failure: {}", e);
            ProbeReport::fail(probe.family())
        }
    }
}

/// Ordering used to break ties at the maximum level; `Greater` wins.
///
/// Largest claimed extent first. The remaining keys only exist so the
/// outcome never depends on evaluation order.
fn preference(a: &Candidate, b: &Candidate) -> Ordering {
    a.extent()
        .cmp(&b.extent())
        .then_with(|| b.kind.cmp(&a.kind))
        .then_with(|| b.volume.variant().cmp(&a.volume.variant()))
        .then_with(|| b.volume.source().cmp(a.volume.source()))
        .then_with(|| a.volume.block_size().cmp(&b.volume.block_size()))
        .then_with(|| b.volume.info().cmp(&a.volume.info()))
}

pub struct Resolver<'r> {
    registry: &'r FilesystemRegistry,
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r FilesystemRegistry) -> Self {
        Self { registry }
    }

    /// Level 0 sweep over every (probe, image) pair.
    fn initial_candidates(&self, images: &[Arc<dyn Volume>]) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for image in images {
            for probe in self.registry.probes() {
                let report = evaluate(probe.as_ref(), image.as_ref(), ProbeLevel::Shape);
                if report.passed {
                    candidates.push(Candidate::new(probe, Arc::clone(image), report.kind));
                    continue;
                }
                if let Some(clustered) = cluster_for(image, report.size) {
                    let retry = evaluate(probe.as_ref(), clustered.as_ref(), ProbeLevel::Shape);
                    if retry.passed {
                        debug!(
                            kind = %retry.kind,
                            view = %clustered.info(),
                            "accepted after clustering"
                        );
                        candidates.push(Candidate::new(probe, clustered, retry.kind));
                    }
                }
            }
        }
        candidates
    }

    /// Determine the file-system kind and final volume view.
    ///
    /// Fails with `UnidentifiedVolume` when no interpretation survives; the
    /// caller decides whether to fall back to raw access.
    pub fn identify(&self, images: &[Arc<dyn Volume>]) -> Result<Identification> {
        let mut candidates = self.initial_candidates(images);
        let mut level = ProbeLevel::Shape;
        debug!(candidates = candidates.len(), "level 0 sweep done");

        while !candidates.is_empty() {
            let Some(next) = level.next() else { break };
            let survivors: Vec<Candidate> =
                candidates.iter().filter_map(|c| c.advance(next)).collect();
            debug!(
                level = %next,
                before = candidates.len(),
                after = survivors.len(),
                "round complete"
            );
            if survivors.is_empty() {
                break;
            }
            candidates = survivors;
            level = next;

            if level > ProbeLevel::Boot && candidates.len() == 1 {
                let winner = candidates.remove(0);
                info!(kind = %winner.kind, level = %level, "identified unique candidate");
                return Ok(winner.into_identification(level, true, 1));
            }
        }

        if level == ProbeLevel::MAX {
            let contenders = candidates.len();
            if let Some(winner) = candidates.into_iter().max_by(preference) {
                info!(
                    kind = %winner.kind,
                    contenders,
                    extent = winner.extent(),
                    "identified by largest extent"
                );
                return Ok(winner.into_identification(level, contenders == 1, contenders));
            }
        }

        info!(level = %level, "volume not identified");
        Err(RelicError::UnidentifiedVolume)
    }

    /// Identify and construct the matching file system.
    ///
    /// `NotConstructible` means identification succeeded but nothing is
    /// registered to browse that kind on that volume variant.
    pub fn mount(&self, images: &[Arc<dyn Volume>]) -> Result<Box<dyn FileSystem>> {
        let identification = self.identify(images)?;
        self.registry.construct(identification.kind, identification.volume)
    }
}

/// Clustered view of `image` when `required` is a larger multiple of its block size.
fn cluster_for(image: &Arc<dyn Volume>, required: Option<u64>) -> Option<Arc<dyn Volume>> {
    let required = required?;
    let block_size = image.block_size() as u64;
    if required == block_size || required % block_size != 0 {
        return None;
    }
    let factor = u32::try_from(required / block_size).ok()?;
    match ClusteredVolume::new(Arc::clone(image), factor, 0) {
        Ok(view) => Some(Arc::new(view)),
        Err(e) => {
            debug!("cannot cluster {}: {}", image.source(), e);
            None
        }
    }
}
