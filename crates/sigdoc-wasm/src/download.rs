//! Browser download sink: wraps bytes in a `Blob` and clicks a
//! temporary anchor.

use sigdoc_core::{Error, Result};
use sigdoc_render::DownloadSink;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Blob, BlobPropertyBag, HtmlAnchorElement, Url};

pub const PDF_MIME: &str = "application/pdf";

/// How long a download URL stays valid after the click. Browsers start
/// the fetch asynchronously.
pub const REVOKE_DELAY_MS: i32 = 10_000;

#[derive(Debug, Default)]
pub struct BlobSink;

impl DownloadSink for BlobSink {
    fn save(&mut self, filename: &str, bytes: &[u8]) -> Result<()> {
        let url = object_url(bytes, PDF_MIME)?;
        let clicked = click_anchor(&url, filename);
        revoke_later(url, REVOKE_DELAY_MS);
        clicked.map_err(|e| js_error("download", e))?;
        log::info!("downloaded {filename}");
        Ok(())
    }
}

/// Blob URL for `bytes`. The caller owns it and must revoke it.
pub fn object_url(bytes: &[u8], mime: &str) -> Result<String> {
    let array = js_sys::Uint8Array::from(bytes);
    let parts = js_sys::Array::of1(&array);
    let options = BlobPropertyBag::new();
    options.set_type(mime);
    let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options)
        .map_err(|e| js_error("blob", e))?;
    Url::create_object_url_with_blob(&blob).map_err(|e| js_error("object url", e))
}

fn click_anchor(url: &str, filename: &str) -> std::result::Result<(), JsValue> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let anchor: HtmlAnchorElement = document.create_element("a")?.dyn_into()?;
    anchor.set_href(url);
    anchor.set_download(filename);
    anchor.click();
    Ok(())
}

/// Revoke `url` after `delay_ms`, or right away when no timer is
/// available.
fn revoke_later(url: String, delay_ms: i32) {
    let Some(window) = web_sys::window() else {
        let _ = Url::revoke_object_url(&url);
        return;
    };
    let revoke_url = url.clone();
    let revoke = Closure::once_into_js(move || {
        let _ = Url::revoke_object_url(&revoke_url);
    });
    if let Err(e) = window.set_timeout_with_callback_and_timeout_and_arguments_0(
        revoke.unchecked_ref(),
        delay_ms,
    ) {
        log::warn!("cannot schedule revoke: {e:?}");
        let _ = Url::revoke_object_url(&url);
    }
}

fn js_error(what: &str, value: JsValue) -> Error {
    let detail = value.as_string().unwrap_or_else(|| format!("{value:?}"));
    Error::Render(format!("{what}: {detail}"))
}
