use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;

use crate::area_resolver::{build_resolver, AreaResolver};
use crate::config::{PipelineConfig, ResolveConfig, TransformConfig};
use crate::coord_transform;
use crate::error::{ConfigError, ResolveError};
use crate::route::{CoordinateSystem, GeoPoint, RawPoint, ResolvedPlace, TrackPoint};
use crate::utils;

const PROGRESS_INTERVAL: usize = 500;

/// Shared cancellation switch. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub total: usize,
    pub processed: usize,
    pub resolved: usize,
    pub failed: usize,
    pub last_error: Option<ResolveError>,
    pub cancelled: bool,
    // stopped early because of `fail_fast`
    pub aborted: bool,
}

#[derive(Clone, Debug)]
pub struct PipelineRun {
    pub points: Vec<TrackPoint>,
    pub summary: RunSummary,
}

type Resolution = Result<ResolvedPlace, ResolveError>;

struct Slot {
    value: Mutex<Option<Resolution>>,
    ready: Condvar,
}

/* Resolution results computed ahead of the sequential pass.

Indices are handed out in increasing order through `cursor`, either to a
worker or to the sequential pass itself when it gets to an index nobody has
claimed yet. A claimed index is always filled, so the sequential pass only
ever blocks on work that is in flight. */
struct Prefetch {
    slots: Vec<Slot>,
    cursor: AtomicUsize,
    stop: AtomicBool,
}

impl Prefetch {
    fn new(len: usize) -> Self {
        Prefetch {
            slots: (0..len)
                .map(|_| Slot {
                    value: Mutex::new(None),
                    ready: Condvar::new(),
                })
                .collect(),
            cursor: AtomicUsize::new(0),
            stop: AtomicBool::new(false),
        }
    }

    fn claim_next(&self) -> Option<usize> {
        let i = self.cursor.fetch_add(1, Ordering::SeqCst);
        if i < self.slots.len() {
            Some(i)
        } else {
            None
        }
    }

    fn fill(&self, i: usize, result: Resolution) {
        let slot = &self.slots[i];
        *slot.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
        slot.ready.notify_all();
    }

    /// Result for index `i`. Resolves inline when no worker has claimed it.
    fn take(&self, i: usize, resolve: impl FnOnce() -> Resolution) -> Resolution {
        if self
            .cursor
            .compare_exchange(i, i + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return resolve();
        }
        let slot = &self.slots[i];
        let guard = slot.value.lock().unwrap_or_else(PoisonError::into_inner);
        let mut guard = slot
            .ready
            .wait_while(guard, |value| value.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        match guard.take() {
            Some(result) => result,
            None => unreachable!("wait_while returned on an empty slot"),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A panicking resolver becomes a failed point. Inside a prefetch worker an
/// unwinding panic would leave its claimed slot empty forever.
fn resolve_guarded(
    resolver: &dyn AreaResolver,
    point: GeoPoint,
    system: CoordinateSystem,
) -> Resolution {
    panic::catch_unwind(AssertUnwindSafe(|| resolver.resolve(point, system))).unwrap_or_else(
        |payload| {
            Err(ResolveError::Panicked {
                resolver: resolver.name().to_string(),
                message: panic_message(payload.as_ref()),
            })
        },
    )
}

pub struct RoutePipeline {
    resolver: Option<Arc<dyn AreaResolver>>,
    transform: TransformConfig,
    resolve: ResolveConfig,
}

impl RoutePipeline {
    pub fn new(
        resolver: Option<Arc<dyn AreaResolver>>,
        transform: TransformConfig,
        resolve: ResolveConfig,
    ) -> Self {
        RoutePipeline {
            resolver,
            transform,
            resolve,
        }
    }

    /// Builds the configured resolver (if any) up front, so configuration
    /// problems show up before the first point.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        config.resolve.validate()?;
        let resolver = match &config.area_info {
            Some(area_info) if config.resolve.enabled => Some(build_resolver(area_info)?),
            _ => None,
        };
        Ok(Self::new(
            resolver,
            config.transform.clone(),
            config.resolve.clone(),
        ))
    }

    fn active_resolver(&self) -> Option<&Arc<dyn AreaResolver>> {
        self.resolver.as_ref().filter(|_| self.resolve.enabled)
    }

    fn transformed(&self, point: GeoPoint) -> Option<(GeoPoint, CoordinateSystem)> {
        if !self.transform.enabled
            || (self.transform.skip_outside_china && coord_transform::is_outside_china(point))
        {
            return None;
        }
        Some((
            coord_transform::transform(point, self.transform.from, self.transform.to),
            self.transform.to,
        ))
    }

    pub fn process(&self, points: Vec<RawPoint>, cancel: &CancelFlag) -> PipelineRun {
        let mut summary = RunSummary {
            total: points.len(),
            ..Default::default()
        };
        let resolver = self.active_resolver();
        info!(
            "processing {} points, resolver: {}, workers: {}",
            points.len(),
            resolver.map(|r| r.name()).unwrap_or("none"),
            self.resolve.workers
        );

        let mut output: Vec<TrackPoint> = Vec::with_capacity(points.len());
        let prefetch = Prefetch::new(points.len());
        let queries: Vec<(GeoPoint, CoordinateSystem)> = points
            .iter()
            .map(|raw| {
                let original = GeoPoint::new(raw.longitude, raw.latitude);
                self.transformed(original)
                    .unwrap_or((original, self.transform.from))
            })
            .collect();

        thread::scope(|scope| {
            let prefetching = match resolver {
                Some(resolver) if self.resolve.workers > 1 && points.len() > 1 => {
                    for _ in 0..self.resolve.workers {
                        let (prefetch, queries) = (&prefetch, &queries);
                        let fail_fast = self.resolve.fail_fast;
                        scope.spawn(move || {
                            while !cancel.is_cancelled() && !prefetch.stop.load(Ordering::Relaxed) {
                                let i = match prefetch.claim_next() {
                                    Some(i) => i,
                                    None => break,
                                };
                                let (point, system) = queries[i];
                                let result = resolve_guarded(resolver.as_ref(), point, system);
                                if fail_fast && result.is_err() {
                                    prefetch.stop.store(true, Ordering::Relaxed);
                                }
                                prefetch.fill(i, result);
                            }
                        });
                    }
                    true
                }
                _ => false,
            };

            for (i, raw) in points.iter().enumerate() {
                if cancel.is_cancelled() {
                    info!("cancelled after {} of {} points", i, points.len());
                    summary.cancelled = true;
                    break;
                }

                let mut point = TrackPoint::from_raw(raw, self.transform.from);
                self.fill_kinematics(&mut point, raw, output.last());
                point.transformed = self.transformed(point.original);

                if let Some(resolver) = resolver {
                    let (query, system) = queries[i];
                    let result = if prefetching {
                        prefetch.take(i, || resolve_guarded(resolver.as_ref(), query, system))
                    } else {
                        resolve_guarded(resolver.as_ref(), query, system)
                    };
                    match result {
                        Ok(place) => {
                            point.apply_place(place);
                            summary.resolved += 1;
                        }
                        Err(e) => {
                            warn!("point {} ({:?}): {}", point.index, point.original, e);
                            point.memo = Some(e.to_string());
                            summary.failed += 1;
                            summary.last_error = Some(e);
                        }
                    }
                }

                point.label_changed = match output.last() {
                    Some(prev) => !point.same_labels_as(prev),
                    None => true,
                };
                let failed = point.memo.is_some();
                output.push(point);
                summary.processed += 1;

                if summary.processed % PROGRESS_INTERVAL == 0 {
                    info!("{} / {} points processed", summary.processed, points.len());
                }
                if failed && self.resolve.fail_fast {
                    error!(
                        "stopping at point {}: {}",
                        raw.index,
                        summary
                            .last_error
                            .as_ref()
                            .map(|e| e.to_string())
                            .unwrap_or_default()
                    );
                    summary.aborted = true;
                    break;
                }
            }
            prefetch.stop.store(true, Ordering::Relaxed);
        });

        info!(
            "done: {} processed, {} resolved, {} failed{}",
            summary.processed,
            summary.resolved,
            summary.failed,
            if summary.cancelled {
                ", cancelled"
            } else if summary.aborted {
                ", aborted"
            } else {
                ""
            }
        );
        PipelineRun {
            points: output,
            summary,
        }
    }

    // distance, speed and course relative to the previous point
    fn fill_kinematics(&self, point: &mut TrackPoint, raw: &RawPoint, prev: Option<&TrackPoint>) {
        let prev = match prev {
            Some(prev) => prev,
            None => {
                point.course = raw.course.unwrap_or(0.);
                return;
            }
        };
        let step =
            utils::distance_3d(prev.original, prev.elevation, point.original, point.elevation);
        point.distance = prev.distance + step;

        let dt = point.elapsed_sec - prev.elapsed_sec;
        point.speed = if dt > 0. { step / dt } else { 0. };

        point.course = match raw.course {
            Some(course) => course,
            None if step == 0. => prev.course,
            None => match utils::initial_bearing(prev.original, point.original) {
                bearing if bearing == 0. => prev.course,
                bearing => bearing,
            },
        };
    }
}
