use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use orbis_common::{FrameTime, Point, SpaceError, validate_radius};
use orbis_ecs::EntityHandle;
use orbis_stream::{Cadence, Chunk, EntityStorage, RegionDiff, RegionTracker, StorageError};

use crate::system::{Lifted, TickSystem, VisibilitySystem};

/// Errors from building or running a pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("no storage is bound to the pipeline")]
    NoStorage,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Space(#[from] SpaceError),
}

/// Which half of the frame a binding belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Update,
    Render,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Update => write!(f, "update"),
            Phase::Render => write!(f, "render"),
        }
    }
}

/// Something that runs in the update and render halves of a frame, each split
/// into an opening and a closing call.
pub trait SystemEngine {
    fn update_begin(&mut self, time: &FrameTime) -> Result<(), PipelineError>;

    fn update_end(&mut self, time: &FrameTime);

    fn render_begin(&mut self, time: &FrameTime) -> Result<(), PipelineError>;

    fn render_end(&mut self, time: &FrameTime);

    /// A whole update half: open, then close.
    fn update(&mut self, time: &FrameTime) -> Result<(), PipelineError> {
        self.update_begin(time)?;
        self.update_end(time);
        Ok(())
    }

    fn render(&mut self, time: &FrameTime) -> Result<(), PipelineError> {
        self.render_begin(time)?;
        self.render_end(time);
        Ok(())
    }
}

/// Several engines run as one: opening calls in order, closing calls in reverse.
#[derive(Default)]
pub struct SystemEngines {
    engines: Vec<Box<dyn SystemEngine>>,
}

impl SystemEngines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, engine: impl SystemEngine + 'static) -> Self {
        self.engines.push(Box::new(engine));
        self
    }

    pub fn push(&mut self, engine: Box<dyn SystemEngine>) {
        self.engines.push(engine);
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl SystemEngine for SystemEngines {
    fn update_begin(&mut self, time: &FrameTime) -> Result<(), PipelineError> {
        for engine in &mut self.engines {
            engine.update_begin(time)?;
        }
        Ok(())
    }

    fn update_end(&mut self, time: &FrameTime) {
        for engine in self.engines.iter_mut().rev() {
            engine.update_end(time);
        }
    }

    fn render_begin(&mut self, time: &FrameTime) -> Result<(), PipelineError> {
        for engine in &mut self.engines {
            engine.render_begin(time)?;
        }
        Ok(())
    }

    fn render_end(&mut self, time: &FrameTime) {
        for engine in self.engines.iter_mut().rev() {
            engine.render_end(time);
        }
    }
}

/// Diagnostic view of one storage's tracking state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSummary {
    pub storage: &'static str,
    pub registered: usize,
    pub visible: usize,
    pub entered: usize,
    pub exited: usize,
    pub still_present: usize,
    pub visibility_systems: usize,
    pub tick_systems: usize,
}

/// Diagnostic view of one phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSummary {
    pub phase: Phase,
    pub radius: f32,
    pub cadence: u64,
    pub last_tick: Option<u64>,
    pub records: Vec<RecordSummary>,
}

/// Type-erased tracking record, so storages of different types share a phase.
trait Record {
    fn storage_addr(&self) -> *const ();

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn refresh(&mut self, center: Point, radius: f32, due: bool) -> Result<(), StorageError>;

    fn open_visibility(&mut self, slot: usize, time: &FrameTime);

    fn close_visibility(&mut self, slot: usize);

    fn run_tick(&mut self, slot: usize, time: &FrameTime);

    fn summary(&self) -> RecordSummary;
}

/// One storage bound to the systems that watch it.
struct TrackingRecord<S: EntityStorage> {
    storage: Rc<RefCell<S>>,
    tracker: RegionTracker<S::Item>,
    diff: RegionDiff<S::Item>,
    visibility: Vec<Box<dyn VisibilitySystem<S::Item>>>,
    ticks: Vec<Box<dyn TickSystem<S::Item>>>,
}

impl<S: EntityStorage> TrackingRecord<S> {
    fn new(storage: Rc<RefCell<S>>) -> Self {
        Self {
            storage,
            tracker: RegionTracker::new(),
            diff: RegionDiff::empty(),
            visibility: Vec::new(),
            ticks: Vec::new(),
        }
    }
}

impl<S> Record for TrackingRecord<S>
where
    S: EntityStorage + 'static,
    S::Item: 'static,
{
    fn storage_addr(&self) -> *const () {
        Rc::as_ptr(&self.storage).cast()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn refresh(&mut self, center: Point, radius: f32, due: bool) -> Result<(), StorageError> {
        self.diff = if due {
            let region = self.storage.borrow().list_around(center, radius)?;
            self.tracker.refresh(region)
        } else {
            RegionDiff {
                entered: Vec::new(),
                exited: Vec::new(),
                still_present: self.tracker.current().cloned().collect(),
            }
        };
        Ok(())
    }

    fn open_visibility(&mut self, slot: usize, time: &FrameTime) {
        let system = &mut self.visibility[slot];
        system.begin(time);
        for item in &self.diff.entered {
            system.enter(item);
        }
        for item in &self.diff.still_present {
            system.update(item, time);
        }
    }

    fn close_visibility(&mut self, slot: usize) {
        let system = &mut self.visibility[slot];
        for item in &self.diff.exited {
            system.exit(item);
        }
        system.finish();
    }

    fn run_tick(&mut self, slot: usize, time: &FrameTime) {
        let system = &mut self.ticks[slot];
        for item in self.tracker.current() {
            system.update(item, time);
        }
        system.tick(time);
    }

    fn summary(&self) -> RecordSummary {
        let name = std::any::type_name::<S>();
        RecordSummary {
            storage: name.rsplit("::").next().unwrap_or(name),
            registered: self.storage.borrow().len(),
            visible: self.tracker.len(),
            entered: self.diff.entered.len(),
            exited: self.diff.exited.len(),
            still_present: self.diff.still_present.len(),
            visibility_systems: self.visibility.len(),
            tick_systems: self.ticks.len(),
        }
    }
}

/// A binding's position in the phase's global registration order.
#[derive(Debug, Clone, Copy)]
enum Ticker {
    Visibility { record: usize, slot: usize },
    Tick { record: usize, slot: usize },
}

/// Tracking state and ordered bindings of one phase.
struct PhaseTracker {
    phase: Phase,
    radius: f32,
    cadence: Cadence,
    records: Vec<Box<dyn Record>>,
    tickers: Vec<Ticker>,
    last_tick: Option<u64>,
}

impl PhaseTracker {
    fn new(phase: Phase) -> Self {
        Self {
            phase,
            radius: 0.0,
            cadence: Cadence::EVERY_TICK,
            records: Vec::new(),
            tickers: Vec::new(),
            last_tick: None,
        }
    }

    /// Index of the record tracking `storage`, created on first use.
    fn record_for<S>(&mut self, storage: &Rc<RefCell<S>>) -> usize
    where
        S: EntityStorage + 'static,
        S::Item: 'static,
    {
        let addr: *const () = Rc::as_ptr(storage).cast();
        if let Some(i) = self.records.iter().position(|r| r.storage_addr() == addr) {
            return i;
        }
        self.records
            .push(Box::new(TrackingRecord::new(Rc::clone(storage))));
        self.records.len() - 1
    }

    fn typed_record<S>(&mut self, index: usize) -> Option<&mut TrackingRecord<S>>
    where
        S: EntityStorage + 'static,
        S::Item: 'static,
    {
        self.records[index]
            .as_any_mut()
            .downcast_mut::<TrackingRecord<S>>()
    }

    fn bind_visibility<S>(
        &mut self,
        system: Box<dyn VisibilitySystem<S::Item>>,
        storage: &Rc<RefCell<S>>,
    ) where
        S: EntityStorage + 'static,
        S::Item: 'static,
    {
        let record = self.record_for(storage);
        if let Some(typed) = self.typed_record::<S>(record) {
            typed.visibility.push(system);
            let slot = typed.visibility.len() - 1;
            self.tickers.push(Ticker::Visibility { record, slot });
        }
    }

    fn bind_tick<S>(&mut self, system: Box<dyn TickSystem<S::Item>>, storage: &Rc<RefCell<S>>)
    where
        S: EntityStorage + 'static,
        S::Item: 'static,
    {
        let record = self.record_for(storage);
        if let Some(typed) = self.typed_record::<S>(record) {
            typed.ticks.push(system);
            let slot = typed.ticks.len() - 1;
            self.tickers.push(Ticker::Tick { record, slot });
        }
    }

    fn begin(&mut self, center: Point, time: &FrameTime) -> Result<(), PipelineError> {
        let _span = tracing::info_span!("phase_begin", phase = %self.phase, tick = time.tick)
            .entered();
        let due = self.cadence.is_due(time.tick);
        for record in &mut self.records {
            record.refresh(center, self.radius, due)?;
        }
        for ticker in &self.tickers {
            match *ticker {
                Ticker::Visibility { record, slot } => {
                    self.records[record].open_visibility(slot, time);
                }
                Ticker::Tick { record, slot } => self.records[record].run_tick(slot, time),
            }
        }
        self.last_tick = Some(time.tick);
        Ok(())
    }

    fn end(&mut self, time: &FrameTime) {
        let _span =
            tracing::info_span!("phase_end", phase = %self.phase, tick = time.tick).entered();
        for ticker in self.tickers.iter().rev() {
            if let Ticker::Visibility { record, slot } = *ticker {
                self.records[record].close_visibility(slot);
            }
        }
    }

    fn summary(&self) -> PhaseSummary {
        PhaseSummary {
            phase: self.phase,
            radius: self.radius,
            cadence: self.cadence.period(),
            last_tick: self.last_tick,
            records: self.records.iter().map(|r| r.summary()).collect(),
        }
    }
}

/// Collects system bindings for both phases, then builds a [`VisibilityPipeline`].
///
/// Bindings in a phase run in the order they were made: opening hooks forward,
/// closing hooks in reverse. Binding several systems to one storage shares a
/// single tracker for that storage within the phase.
pub struct VisibilityPipelineBuilder {
    trackee: EntityHandle,
    update: PhaseTracker,
    render: PhaseTracker,
}

impl VisibilityPipelineBuilder {
    pub fn new(trackee: EntityHandle) -> Self {
        Self {
            trackee,
            update: PhaseTracker::new(Phase::Update),
            render: PhaseTracker::new(Phase::Render),
        }
    }

    fn phase_mut(&mut self, phase: Phase) -> &mut PhaseTracker {
        match phase {
            Phase::Update => &mut self.update,
            Phase::Render => &mut self.render,
        }
    }

    /// Sampling radius of a phase around the trackee.
    pub fn radius(mut self, phase: Phase, radius: f32) -> Self {
        self.phase_mut(phase).radius = radius;
        self
    }

    pub fn cadence(mut self, phase: Phase, cadence: Cadence) -> Self {
        self.phase_mut(phase).cadence = cadence;
        self
    }

    /// Bind a system to the items `storage` returns.
    pub fn bind<S, V>(mut self, system: V, storage: &Rc<RefCell<S>>, phase: Phase) -> Self
    where
        S: EntityStorage + 'static,
        S::Item: 'static,
        V: VisibilitySystem<S::Item> + 'static,
    {
        self.phase_mut(phase).bind_visibility(Box::new(system), storage);
        self
    }

    /// Bind a per-entity system to the members of the chunks `storage` returns.
    pub fn bind_lifted<S, V>(self, system: V, storage: &Rc<RefCell<S>>, phase: Phase) -> Self
    where
        S: EntityStorage<Item = Chunk> + 'static,
        V: VisibilitySystem<EntityHandle> + 'static,
    {
        self.bind(Lifted::new(system), storage, phase)
    }

    pub fn bind_tick<S, T>(mut self, system: T, storage: &Rc<RefCell<S>>, phase: Phase) -> Self
    where
        S: EntityStorage + 'static,
        S::Item: 'static,
        T: TickSystem<S::Item> + 'static,
    {
        self.phase_mut(phase).bind_tick(Box::new(system), storage);
        self
    }

    pub fn bind_tick_lifted<S, T>(self, system: T, storage: &Rc<RefCell<S>>, phase: Phase) -> Self
    where
        S: EntityStorage<Item = Chunk> + 'static,
        T: TickSystem<EntityHandle> + 'static,
    {
        self.bind_tick(Lifted::new(system), storage, phase)
    }

    pub fn build(self) -> Result<VisibilityPipeline, PipelineError> {
        if self.update.records.is_empty() && self.render.records.is_empty() {
            return Err(PipelineError::NoStorage);
        }
        validate_radius(self.update.radius)?;
        validate_radius(self.render.radius)?;
        tracing::debug!(
            update_bindings = self.update.tickers.len(),
            render_bindings = self.render.tickers.len(),
            "visibility pipeline built"
        );
        Ok(VisibilityPipeline {
            trackee: self.trackee,
            update: self.update,
            render: self.render,
        })
    }
}

/// Immutable set of bindings driven once per frame around a trackee.
pub struct VisibilityPipeline {
    trackee: EntityHandle,
    update: PhaseTracker,
    render: PhaseTracker,
}

impl VisibilityPipeline {
    pub fn builder(trackee: EntityHandle) -> VisibilityPipelineBuilder {
        VisibilityPipelineBuilder::new(trackee)
    }

    pub fn trackee(&self) -> &EntityHandle {
        &self.trackee
    }

    fn phase(&self, phase: Phase) -> &PhaseTracker {
        match phase {
            Phase::Update => &self.update,
            Phase::Render => &self.render,
        }
    }

    pub fn radius(&self, phase: Phase) -> f32 {
        self.phase(phase).radius
    }

    /// Change a phase's sampling radius, for example after a viewport resize.
    /// Takes effect at the next refresh.
    pub fn set_radius(&mut self, phase: Phase, radius: f32) -> Result<(), PipelineError> {
        validate_radius(radius)?;
        match phase {
            Phase::Update => self.update.radius = radius,
            Phase::Render => self.render.radius = radius,
        }
        Ok(())
    }

    pub fn summary(&self, phase: Phase) -> PhaseSummary {
        self.phase(phase).summary()
    }
}

impl SystemEngine for VisibilityPipeline {
    fn update_begin(&mut self, time: &FrameTime) -> Result<(), PipelineError> {
        let center = self.trackee.position();
        self.update.begin(center, time)
    }

    fn update_end(&mut self, time: &FrameTime) {
        self.update.end(time);
    }

    fn render_begin(&mut self, time: &FrameTime) -> Result<(), PipelineError> {
        let center = self.trackee.position();
        self.render.begin(center, time)
    }

    fn render_end(&mut self, time: &FrameTime) {
        self.render.end(time);
    }
}
