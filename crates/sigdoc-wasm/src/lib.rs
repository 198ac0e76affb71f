//! WASM bridge for sigdoc: exposes the agreement flow to the signing page.
//!
//! Compiled via `wasm-pack build --target web`. The page forwards pointer
//! and resize events, blits the live ink buffer with `putImageData`, and
//! reads every other result as JSON: `{"ok":true,...}` or
//! `{"ok":false,"error":"...","retryable":bool}`.

mod download;
mod storage;

use chrono::NaiveDate;
use js_sys::Promise;
use serde_json::{Value, json};
use sigdoc_core::{
    CanvasGeometry, Error, PageLayout, RecordDraft, RenderMode, SelectionCache, SignatureState,
};
use sigdoc_ink::{AgreementFlow, InputEvent, PendingRender, Step};
use sigdoc_render::{CaptureConfig, DownloadSink, InkStyle, build_pdf};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, future_to_promise};
use web_sys::{CanvasRenderingContext2d, ImageData};

pub use download::BlobSink;
pub use storage::BrowserStore;

/// Page controller. Owns the flow state between screens; all interaction
/// from the page goes through this struct.
#[wasm_bindgen]
pub struct AgreementApp {
    /// Shared with renders that finish after the call that started them.
    flow: Rc<RefCell<AgreementFlow<BrowserStore>>>,
}

#[wasm_bindgen]
impl AgreementApp {
    /// Create a controller. `config_json` may override capture settings
    /// (`{"minWidth":1,"maxWidth":3,...}`); an empty string keeps defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Self {
        console_error_panic_hook_setup();

        let config = if config_json.trim().is_empty() {
            CaptureConfig::default()
        } else {
            serde_json::from_str(config_json).unwrap_or_else(|e| {
                log::warn!("ignoring capture config: {e}");
                CaptureConfig::default()
            })
        };
        Self {
            flow: Rc::new(RefCell::new(AgreementFlow::new(
                SelectionCache::new(BrowserStore::detect()),
                config,
                InkStyle::default(),
            ))),
        }
    }

    /// Pick up a selection from before a reload. Returns the screen to show.
    pub fn restore(&mut self) -> String {
        step_name(self.flow.borrow_mut().restore(now_ms())).to_string()
    }

    pub fn step(&self) -> String {
        step_name(self.flow.borrow().step()).to_string()
    }

    // ─── Record source ───────────────────────────────────────────────────

    /// Parse an uploaded CSV. Returns `{"ok":true,"step":"...","records":[...]}`.
    pub fn load_csv(&mut self, text: &str) -> String {
        let loaded = self.flow.borrow_mut().load_csv(text, now_ms());
        match loaded {
            Ok(step) => self.step_response(step),
            Err(e) => error_json(&e),
        }
    }

    /// Submit the manual-entry form as JSON
    /// (`{"name":..,"assetName":..,"assetId":..,"additionalAssets":[..]}`).
    pub fn submit_manual(&mut self, draft_json: &str) -> String {
        let draft: RecordDraft = match serde_json::from_str(draft_json) {
            Ok(draft) => draft,
            Err(e) => return message_json(&format!("invalid form data: {e}")),
        };
        let submitted = self.flow.borrow_mut().submit_manual(&draft, now_ms());
        match submitted {
            Ok(step) => self.step_response(step),
            Err(e) => error_json(&e),
        }
    }

    /// Update the search box. Returns the filtered records.
    pub fn set_query(&mut self, query: &str) -> String {
        self.flow.borrow_mut().set_query(query);
        self.records_json()
    }

    /// Currently visible records: `{"ok":true,"records":[...]}`.
    pub fn records_json(&self) -> String {
        ok_json(json!({ "records": self.flow.borrow().filtered() }))
    }

    /// Choose the `index`-th visible record.
    pub fn select(&mut self, index: usize) -> String {
        let mut flow = self.flow.borrow_mut();
        match flow.select(index, now_ms()) {
            Ok(record) => ok_json(json!({ "record": record })),
            Err(e) => error_json(&e),
        }
    }

    /// The chosen record as JSON, or `null`.
    pub fn selected_json(&self) -> String {
        serde_json::to_string(&self.flow.borrow().selected()).unwrap_or_else(|_| "null".to_string())
    }

    pub fn back_to_input(&mut self) {
        self.flow.borrow_mut().back_to_input();
    }

    pub fn back_to_selection(&mut self) {
        self.flow.borrow_mut().back_to_selection();
    }

    /// Extra asset names typed on the review screen, as a JSON array.
    pub fn set_extra_items(&mut self, items_json: &str) -> String {
        match serde_json::from_str::<Vec<String>>(items_json) {
            Ok(items) => {
                self.flow.borrow_mut().set_extra_items(items);
                ok_json(json!({}))
            }
            Err(e) => message_json(&format!("invalid asset list: {e}")),
        }
    }

    // ─── Signing ─────────────────────────────────────────────────────────

    /// Open the signing modal for a container of `width`×`height` CSS
    /// pixels at `dpr`. Unusable sizes fall back to the default canvas.
    pub fn open_signing(&mut self, width: f32, height: f32, dpr: f32) -> String {
        let geometry = CanvasGeometry::or_fallback(width, height, dpr);
        let mut flow = self.flow.borrow_mut();
        match flow.open_signing(geometry) {
            Ok(()) => ok_json(json!({ "geometry": flow.session().geometry() })),
            Err(e) => error_json(&e),
        }
    }

    pub fn pointer_down(&mut self, x: f32, y: f32, pressure: f32, timestamp: f64) -> bool {
        self.flow
            .borrow_mut()
            .handle(&InputEvent::pointer_down(x, y, pressure, event_ms(timestamp)))
    }

    pub fn pointer_move(&mut self, x: f32, y: f32, pressure: f32, timestamp: f64) -> bool {
        self.flow
            .borrow_mut()
            .handle(&InputEvent::pointer_move(x, y, pressure, event_ms(timestamp)))
    }

    pub fn pointer_up(&mut self, x: f32, y: f32, timestamp: f64) -> bool {
        self.flow
            .borrow_mut()
            .handle(&InputEvent::pointer_up(x, y, event_ms(timestamp)))
    }

    pub fn pointer_cancel(&mut self) -> bool {
        self.flow.borrow_mut().handle(&InputEvent::PointerCancel)
    }

    pub fn resize(&mut self, width: f32, height: f32, dpr: f32) -> bool {
        self.flow.borrow_mut().handle(&InputEvent::Resize {
            width,
            height,
            device_pixel_ratio: dpr,
        })
    }

    /// `Empty`, `InProgress` or `Captured`.
    pub fn signature_state(&self) -> String {
        match self.flow.borrow().session().state() {
            SignatureState::Empty => "Empty",
            SignatureState::InProgress => "InProgress",
            SignatureState::Captured => "Captured",
        }
        .to_string()
    }

    pub fn clear_signature(&mut self) {
        self.flow.borrow_mut().session_mut().clear();
    }

    /// Copy the live buffer onto `ctx` if it changed since the last call.
    /// The canvas element is resized to the buffer when they differ.
    pub fn paint(&mut self, ctx: &CanvasRenderingContext2d) -> bool {
        let mut flow = self.flow.borrow_mut();
        let Some(surface) = flow.session_mut().surface_mut() else {
            return false;
        };
        if !surface.take_dirty() {
            return false;
        }
        let (width, height) = (surface.pixmap().width(), surface.pixmap().height());
        if let Some(canvas) = ctx.canvas()
            && (canvas.width() != width || canvas.height() != height)
        {
            canvas.set_width(width);
            canvas.set_height(height);
        }
        let rgba = surface.to_rgba();
        let painted = ImageData::new_with_u8_clamped_array_and_sh(
            wasm_bindgen::Clamped(&rgba[..]),
            width,
            height,
        )
        .and_then(|image| ctx.put_image_data(&image, 0.0, 0.0));
        if let Err(e) = painted {
            log::warn!("putImageData failed: {e:?}");
            return false;
        }
        true
    }

    /// Commit the drawing. Fails while the canvas is empty.
    pub fn finalize_signing(&mut self) -> String {
        let finalized = self.flow.borrow_mut().finalize_signing();
        match finalized {
            Ok(()) => ok_json(json!({ "state": "Captured" })),
            Err(e) => error_json(&e),
        }
    }

    pub fn cancel_signing(&mut self) {
        self.flow.borrow_mut().cancel_signing();
    }

    pub fn remove_signature(&mut self) {
        self.flow.borrow_mut().remove_signature();
    }

    pub fn has_signature(&self) -> bool {
        self.flow.borrow().signature().is_some()
    }

    /// Encoded bytes of the committed signature, for a thumbnail.
    pub fn signature_png(&self) -> Option<Vec<u8>> {
        self.flow.borrow().signature().map(|s| s.image.bytes.clone())
    }

    // ─── Output ──────────────────────────────────────────────────────────

    pub fn is_rendering(&self) -> bool {
        self.flow.borrow().gate().is_busy()
    }

    /// Render for inline display. Resolves to `{"ok":true,"url":"blob:..."}`;
    /// the page revokes the URL when the preview closes.
    pub fn preview(&self) -> Promise {
        self.render_later(RenderMode::Preview)
    }

    /// Render and hand the file to the browser's download manager.
    /// Resolves to `{"ok":true,"filename":"..."}`.
    pub fn download(&self) -> Promise {
        self.render_later(RenderMode::Download)
    }

    /// Name the downloaded file will get, or an empty string.
    pub fn filename(&self) -> String {
        self.flow
            .borrow()
            .document(today())
            .map(|doc| doc.filename())
            .unwrap_or_default()
    }
}

impl AgreementApp {
    fn step_response(&self, step: Step) -> String {
        let flow = self.flow.borrow();
        ok_json(json!({
            "step": step_name(step),
            "records": flow.filtered(),
            "selected": flow.selected(),
        }))
    }

    /// Claim the gate now, render on a later tick. The busy flag is visible
    /// to the page in between, and a signature change in the meantime
    /// drops the result.
    fn render_later(&self, mode: RenderMode) -> Promise {
        let pending = self.flow.borrow().begin_render(today());
        let flow = Rc::clone(&self.flow);
        future_to_promise(async move {
            let pending = match pending {
                Ok(pending) => pending,
                Err(e) => return Ok(JsValue::from_str(&error_json(&e))),
            };
            if let Err(e) = next_tick().await {
                log::warn!("render tick failed: {e:?}");
            }
            Ok(JsValue::from_str(&finish_render(&flow, pending, mode)))
        })
    }
}

/// Build the PDF and deliver it, unless the signing session moved on.
fn finish_render(
    flow: &RefCell<AgreementFlow<BrowserStore>>,
    pending: PendingRender,
    mode: RenderMode,
) -> String {
    let PendingRender { ticket, document } = pending;
    let bytes = build_pdf(&document, &PageLayout::default());
    let Ok(flow) = flow.try_borrow() else {
        return error_json(&Error::RenderInFlight);
    };
    let delivered = flow
        .complete_render(ticket, bytes)
        .and_then(|bytes| match mode {
            RenderMode::Preview => download::object_url(&bytes, download::PDF_MIME)
                .map(|url| json!({ "url": url })),
            RenderMode::Download => {
                let filename = document.filename();
                BlobSink.save(&filename, &bytes)?;
                Ok(json!({ "filename": filename }))
            }
        });
    match delivered {
        Ok(body) => ok_json(body),
        Err(e) => error_json(&e),
    }
}

/// Resolves on the next macrotask.
async fn next_tick() -> std::result::Result<(), JsValue> {
    let promise = Promise::new(&mut |resolve, _reject| {
        let scheduled = web_sys::window().map(|window| {
            window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, 0)
        });
        if !matches!(scheduled, Some(Ok(_))) {
            let _ = resolve.call0(&JsValue::NULL);
        }
    });
    JsFuture::from(promise).await.map(|_| ())
}

fn step_name(step: Step) -> &'static str {
    match step {
        Step::Input => "input",
        Step::Selecting => "selecting",
        Step::Review => "review",
    }
}

fn ok_json(mut body: Value) -> String {
    if let Value::Object(map) = &mut body {
        map.insert("ok".to_string(), Value::Bool(true));
    }
    body.to_string()
}

fn error_json(err: &Error) -> String {
    json!({
        "ok": false,
        "error": err.to_string(),
        "retryable": err.is_retryable(),
    })
    .to_string()
}

fn message_json(message: &str) -> String {
    json!({ "ok": false, "error": message, "retryable": false }).to_string()
}

/// `PointerEvent.timeStamp` is a fractional millisecond count.
fn event_ms(timestamp: f64) -> u64 {
    if timestamp.is_finite() && timestamp > 0.0 {
        timestamp as u64
    } else {
        0
    }
}

fn now_ms() -> u64 {
    #[cfg(target_arch = "wasm32")]
    {
        event_ms(js_sys::Date::now())
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

fn today() -> NaiveDate {
    #[cfg(target_arch = "wasm32")]
    {
        let now = js_sys::Date::new_0();
        NaiveDate::from_ymd_opt(
            now.get_full_year() as i32,
            now.get_month() + 1,
            now.get_date(),
        )
        .unwrap_or_default()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        chrono::Local::now().date_naive()
    }
}

fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("sigdoc-wasm panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn csv_with_several_rows_asks_for_selection() {
        let mut app = AgreementApp::new("");
        let out = parse(&app.load_csv(
            "name,assetName,assetId\nJane Smith,Chair,CH002\nBob Lee,Laptop,LP100\n",
        ));
        assert_eq!(out["ok"], true);
        assert_eq!(out["step"], "selecting");
        assert_eq!(out["records"].as_array().unwrap().len(), 2);

        let filtered = parse(&app.set_query("lp"));
        assert_eq!(filtered["records"][0]["name"], "Bob Lee");
        let chosen = parse(&app.select(0));
        assert_eq!(chosen["record"]["assetId"], "LP100");
        assert_eq!(app.step(), "review");
    }

    #[test]
    fn bad_csv_reports_message() {
        let mut app = AgreementApp::new("");
        let out = parse(&app.load_csv("foo,bar\n1,2\n"));
        assert_eq!(out["ok"], false);
        assert_eq!(out["retryable"], false);
        assert!(out["error"].as_str().unwrap().contains("No valid data found"));
    }

    #[test]
    fn manual_entry_then_sign() {
        let mut app = AgreementApp::new(r#"{"minDistance":2.0}"#);
        let out = parse(&app.submit_manual(
            r#"{"name":"Jane Smith","assetName":"Office Chair","assetId":"CH002"}"#,
        ));
        assert_eq!(out["step"], "review");

        let opened = parse(&app.open_signing(600.0, 256.0, 2.0));
        assert_eq!(opened["geometry"]["devicePixelRatio"], 2.0);
        assert_eq!(parse(&app.finalize_signing())["ok"], false);

        assert!(app.pointer_down(10.0, 10.0, 0.5, 0.0));
        assert!(app.pointer_move(60.0, 40.0, 0.5, 16.0));
        assert!(app.pointer_up(120.0, 30.0, 32.0));
        assert_eq!(app.signature_state(), "InProgress");
        assert_eq!(parse(&app.finalize_signing())["ok"], true);
        assert!(app.has_signature());
        assert!(app.signature_png().unwrap().starts_with(b"\x89PNG"));
        assert!(app.filename().starts_with("Asset_Agreement_Jane_Smith_CH002_"));
    }

    #[test]
    fn render_landing_after_reopen_is_dropped() {
        let mut app = AgreementApp::new("");
        app.submit_manual(r#"{"name":"Jane Smith","assetName":"Office Chair","assetId":"CH002"}"#);
        app.open_signing(600.0, 256.0, 1.0);
        app.pointer_down(10.0, 10.0, 0.5, 0.0);
        app.pointer_move(60.0, 40.0, 0.5, 16.0);
        app.pointer_up(120.0, 30.0, 32.0);
        assert_eq!(parse(&app.finalize_signing())["ok"], true);

        let pending = app.flow.borrow().begin_render(today()).unwrap();
        assert!(app.is_rendering());
        app.open_signing(600.0, 256.0, 1.0);

        let out = parse(&finish_render(&app.flow, pending, RenderMode::Download));
        assert_eq!(out["ok"], false);
        assert_eq!(out["retryable"], true);
        assert!(out["error"].as_str().unwrap().contains("signature changed"));
        assert!(!app.is_rendering());
    }

    #[test]
    fn invalid_form_json_is_an_error() {
        let mut app = AgreementApp::new("");
        let out = parse(&app.submit_manual("{"));
        assert_eq!(out["ok"], false);
        assert_eq!(app.step(), "input");
    }

    #[test]
    fn event_timestamps_are_clamped() {
        assert_eq!(event_ms(-4.0), 0);
        assert_eq!(event_ms(f64::NAN), 0);
        assert_eq!(event_ms(16.7), 16);
    }
}
