//! Agreement flow: record source → selection → signing → assembly → render.
//!
//! Holds the state of the single-page application outside of any UI
//! toolkit. The browser bridge and the CLI both drive it.

use crate::input::InputEvent;
use crate::session::{CommittedSignature, SigningSession};
use chrono::NaiveDate;
use sigdoc_core::{
    CanvasGeometry, Document, Error, InputMode, KeyValueStore, Record, RecordBatch, RecordDraft,
    RenderMode, Result, SelectionCache, assemble, filter_records, parse_csv,
};
use sigdoc_render::{
    CaptureConfig, InkStyle, RenderBackend, RenderGate, RenderOutput, RenderTicket,
};

/// A render that holds the gate: the document to render and the ticket
/// that completes it.
#[derive(Debug)]
pub struct PendingRender {
    pub ticket: RenderTicket,
    pub document: Document,
}

/// Which screen the user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Upload or manual entry.
    Input,
    /// Choosing one of several uploaded records.
    Selecting,
    /// A record is selected; signing and output happen here.
    Review,
}

pub struct AgreementFlow<S> {
    cache: SelectionCache<S>,
    records: Vec<Record>,
    query: String,
    selected: Option<Record>,
    input_mode: InputMode,
    extra_items: Vec<String>,
    session: SigningSession,
    signature: Option<CommittedSignature>,
    gate: RenderGate,
}

impl<S: KeyValueStore> AgreementFlow<S> {
    pub fn new(cache: SelectionCache<S>, config: CaptureConfig, style: InkStyle) -> Self {
        Self {
            cache,
            records: Vec::new(),
            query: String::new(),
            selected: None,
            input_mode: InputMode::File,
            extra_items: Vec::new(),
            session: SigningSession::new(config, style),
            signature: None,
            gate: RenderGate::new(),
        }
    }

    /// Pick up a selection that survived a reload. Anything unusable is
    /// discarded and the flow starts over.
    pub fn restore(&mut self, now_ms: u64) -> Step {
        let restored = self.cache.restore(now_ms);
        if !restored.is_empty() {
            log::debug!(
                "restored {} records, selection: {}",
                restored.parsed.len(),
                restored.current.is_some()
            );
        }
        self.records = restored.parsed;
        if let Some(mode) = restored.input_mode {
            self.input_mode = mode;
        }
        self.selected = restored.current.filter(|r| r.ensure_complete().is_ok());
        self.step()
    }

    pub fn step(&self) -> Step {
        if self.selected.is_some() {
            Step::Review
        } else if self.records.len() > 1 {
            Step::Selecting
        } else {
            Step::Input
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn selected(&self) -> Option<&Record> {
        self.selected.as_ref()
    }

    pub fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    pub fn signature(&self) -> Option<&CommittedSignature> {
        self.signature.as_ref()
    }

    pub fn session(&self) -> &SigningSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SigningSession {
        &mut self.session
    }

    pub fn gate(&self) -> &RenderGate {
        &self.gate
    }

    // ─── Record source ───────────────────────────────────────────────────

    pub fn load_csv(&mut self, text: &str, now_ms: u64) -> Result<Step> {
        let records = parse_csv(text)?;
        self.load_records(records, now_ms)
    }

    /// One record goes straight to review; several need a selection.
    pub fn load_records(&mut self, records: Vec<Record>, now_ms: u64) -> Result<Step> {
        self.reset_signing();
        self.query.clear();
        self.input_mode = InputMode::File;
        match RecordBatch::classify(records).non_empty()? {
            RecordBatch::Single(record) => {
                self.records.clear();
                self.choose(record, now_ms);
            }
            RecordBatch::Many(records) => {
                self.cache.save_parsed(&records, now_ms);
                self.records = records;
                self.selected = None;
            }
            RecordBatch::Empty => {}
        }
        Ok(self.step())
    }

    pub fn submit_manual(&mut self, draft: &RecordDraft, now_ms: u64) -> Result<Step> {
        let record = draft.validate()?;
        self.reset_signing();
        self.records.clear();
        self.input_mode = InputMode::Manual;
        self.choose(record, now_ms);
        Ok(self.step())
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
    }

    pub fn filtered(&self) -> Vec<&Record> {
        filter_records(&self.records, &self.query)
    }

    /// Select the `index`-th record of the filtered list.
    pub fn select(&mut self, index: usize, now_ms: u64) -> Result<&Record> {
        let record = self
            .filtered()
            .get(index)
            .map(|r| (*r).clone())
            .ok_or_else(|| Error::RecordSource(format!("no record at position {index}")))?;
        self.reset_signing();
        self.choose(record, now_ms);
        self.selected
            .as_ref()
            .ok_or_else(|| Error::RecordSource("no record selected".to_string()))
    }

    /// Drop selection, records and cache; back to the first screen.
    pub fn back_to_input(&mut self) {
        self.records.clear();
        self.query.clear();
        self.selected = None;
        self.extra_items.clear();
        self.reset_signing();
        self.cache.clear();
    }

    /// Back from review to the selection list, keeping the uploaded records.
    pub fn back_to_selection(&mut self) {
        self.selected = None;
        self.reset_signing();
    }

    pub fn set_extra_items(&mut self, items: Vec<String>) {
        self.extra_items = items;
    }

    // ─── Signing ─────────────────────────────────────────────────────────

    pub fn open_signing(&mut self, geometry: CanvasGeometry) -> Result<()> {
        if self.selected.is_none() {
            return Err(Error::RecordSource("no record selected".to_string()));
        }
        self.session.open(geometry, self.signature.as_ref());
        Ok(())
    }

    pub fn handle(&mut self, event: &InputEvent) -> bool {
        self.session.handle(event)
    }

    pub fn finalize_signing(&mut self) -> Result<()> {
        let committed = self.session.finalize()?;
        self.signature = Some(committed);
        Ok(())
    }

    pub fn cancel_signing(&mut self) {
        self.session.cancel();
    }

    pub fn remove_signature(&mut self) {
        self.signature = None;
    }

    // ─── Output ──────────────────────────────────────────────────────────

    /// Assemble the agreement for the selected record. A missing signature
    /// yields a placeholder.
    pub fn document(&self, today: NaiveDate) -> Result<Document> {
        let record = self
            .selected
            .as_ref()
            .ok_or_else(|| Error::RecordSource("no record selected".to_string()))?;
        assemble(
            record,
            self.signature.as_ref().map(|s| &s.image),
            &self.extra_items,
            today,
        )
    }

    /// Claim the render gate and assemble the document for the current
    /// signature. Requires a signature; rejected while another render is
    /// in flight. The gate stays claimed until the returned ticket is
    /// passed to [`complete_render`](Self::complete_render) or dropped.
    pub fn begin_render(&self, today: NaiveDate) -> Result<PendingRender> {
        if self.signature.is_none() {
            return Err(Error::SignatureRequired);
        }
        let ticket = self.gate.try_begin(self.session.id())?;
        let document = self.document(today)?;
        Ok(PendingRender { ticket, document })
    }

    /// Release the gate and hand back `result`, unless the signing session
    /// changed since [`begin_render`](Self::begin_render). Stale results
    /// are dropped.
    pub fn complete_render<T>(&self, ticket: RenderTicket, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            log::warn!("render failed: {err}");
        }
        let started = ticket.session();
        ticket.resolve(self.session.id(), result).unwrap_or_else(|| {
            log::info!("render for {started} finished after the signature changed");
            Err(Error::Render("signature changed during render".to_string()))
        })
    }

    /// Begin, render and complete in one go.
    pub fn render<B: RenderBackend>(
        &self,
        backend: &mut B,
        mode: RenderMode,
        today: NaiveDate,
    ) -> Result<RenderOutput> {
        let PendingRender { ticket, document } = self.begin_render(today)?;
        let result = backend.render(&document, mode);
        self.complete_render(ticket, result)
    }

    fn choose(&mut self, record: Record, now_ms: u64) {
        self.cache.save_current(&record, self.input_mode, now_ms);
        self.selected = Some(record);
    }

    fn reset_signing(&mut self) {
        self.session.cancel();
        self.signature = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sigdoc_core::MemoryStore;

    fn flow() -> AgreementFlow<MemoryStore> {
        AgreementFlow::new(
            SelectionCache::new(MemoryStore::new()),
            CaptureConfig::default(),
            InkStyle::default(),
        )
    }

    #[test]
    fn single_record_skips_selection() {
        let mut f = flow();
        let step = f
            .load_records(vec![Record::new("Jane", "Chair", "CH1")], 0)
            .unwrap();
        assert_eq!(step, Step::Review);
        assert_eq!(f.selected().unwrap().name, "Jane");
    }

    #[test]
    fn selection_survives_reload() {
        let mut f = flow();
        let records = vec![
            Record::new("Jane", "Chair", "CH1"),
            Record::new("Bob", "Laptop", "LP1"),
        ];
        assert_eq!(f.load_records(records, 0).unwrap(), Step::Selecting);
        f.set_query("lp");
        assert_eq!(f.select(0, 10).unwrap().name, "Bob");

        let AgreementFlow { cache, .. } = f;
        let mut reloaded = AgreementFlow::new(cache, CaptureConfig::default(), InkStyle::default());
        assert_eq!(reloaded.restore(20), Step::Review);
        assert_eq!(reloaded.selected().unwrap().name, "Bob");
        assert_eq!(reloaded.records().len(), 2);
    }

    #[test]
    fn manual_entry_is_validated() {
        let mut f = flow();
        let err = f.submit_manual(&RecordDraft::default(), 0).unwrap_err();
        assert_eq!(err, Error::IncompleteRecord { field: "name" });
        assert_eq!(f.step(), Step::Input);
    }

    #[test]
    fn signing_requires_a_selection() {
        let mut f = flow();
        let err = f.open_signing(CanvasGeometry::FALLBACK).unwrap_err();
        assert!(matches!(err, Error::RecordSource(_)));
    }

    #[test]
    fn back_to_input_clears_cache() {
        let mut f = flow();
        f.load_records(vec![Record::new("Jane", "Chair", "CH1")], 0)
            .unwrap();
        f.back_to_input();
        assert_eq!(f.step(), Step::Input);
        assert_eq!(f.restore(1), Step::Input);
    }
}
