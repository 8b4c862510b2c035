//! Narrow message channel between the backend page and the host.
//!
//! The page gets `window.desktopBridge` with `send("toHost", payload)` and
//! `on("fromHost", callback)`. Any other channel name is ignored on both
//! sides.

use serde_json::Value;

pub const TO_HOST: &str = "toHost";
pub const FROM_HOST: &str = "fromHost";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeChannel {
    ToHost,
    FromHost,
}

impl BridgeChannel {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            TO_HOST => Some(Self::ToHost),
            FROM_HOST => Some(Self::FromHost),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ToHost => TO_HOST,
            Self::FromHost => FROM_HOST,
        }
    }
}

/// Pages may only send on `toHost`.
pub fn accept_inbound(channel: &str) -> bool {
    BridgeChannel::parse(channel) == Some(BridgeChannel::ToHost)
}

/// Script that delivers `payload` to `fromHost` listeners in the page.
pub fn dispatch_script(payload: &Value) -> String {
    format!(
        "window.__paramxBridge && window.__paramxBridge.dispatch({:?}, {payload});",
        BridgeChannel::FromHost.name()
    )
}

/// Injected before any page script runs.
///
/// Also routes `window.open` and `target="_blank"` links through top-level
/// navigation, where the host navigation policy sees them.
pub const BRIDGE_SCRIPT: &str = r#"
(function () {
  if (window.__paramxBridge) return;

  var listeners = [];

  function invoke(cmd, args) {
    var internals = window.__TAURI_INTERNALS__;
    if (!internals || typeof internals.invoke !== 'function') return Promise.resolve();
    return internals.invoke(cmd, args);
  }

  Object.defineProperty(window, '__paramxBridge', {
    value: Object.freeze({
      dispatch: function (channel, payload) {
        if (channel !== 'fromHost') return;
        listeners.slice().forEach(function (callback) {
          try { callback(payload); } catch (e) { console.error(e); }
        });
      },
    }),
  });

  window.desktopBridge = Object.freeze({
    send: function (channel, payload) {
      if (channel !== 'toHost') return;
      invoke('bridge_send', {
        channel: channel,
        payload: payload === undefined ? null : payload,
      }).catch(function () {});
    },
    on: function (channel, callback) {
      if (channel !== 'fromHost' || typeof callback !== 'function') {
        return function () {};
      }
      listeners.push(callback);
      return function () {
        var index = listeners.indexOf(callback);
        if (index >= 0) listeners.splice(index, 1);
      };
    },
  });

  window.open = function (url) {
    if (url) window.location.href = new URL(String(url), window.location.href).href;
    return null;
  };

  document.addEventListener('click', function (event) {
    var target = event.target;
    var link = target && target.closest ? target.closest('a[target="_blank"]') : null;
    if (!link || !link.href) return;
    event.preventDefault();
    window.location.href = link.href;
  }, true);
})();
"#;
