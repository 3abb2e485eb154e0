//! URI utilities.
//!
//! [RFC 2397 The "data" URL scheme](https://www.rfc-editor.org/rfc/rfc2397)
//! [URL Standard § 1.3 Percent-encoded bytes](https://url.spec.whatwg.org/#percent-encoded-bytes)

use std::borrow::Cow;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Prefix of an inline, unencoded SVG document.
pub const SVG_DATA_URI_PREFIX: &str = "data:image/svg+xml;utf8,";

/// The component percent-encode set: everything except ASCII alphanumerics
/// and `- _ . ! ~ * ' ( )`.
///
/// [URL Standard § 1.3](https://url.spec.whatwg.org/#component-percent-encode-set)
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode `component` so it can be embedded anywhere in a URI.
#[must_use]
pub fn encode_uri_component(component: &str) -> String {
    utf8_percent_encode(component, COMPONENT).to_string()
}

/// Reverse of [`encode_uri_component`]. Invalid UTF-8 is replaced lossily.
#[must_use]
pub fn decode_uri_component(component: &str) -> String {
    percent_decode_str(component).decode_utf8_lossy().into_owned()
}

/// Escape the payload of an inline SVG data URI.
///
/// A `data:image/svg+xml;utf8,<svg ...>` URI is commonly written with raw
/// markup, which breaks once the URI is placed inside a CSS `url("...")`
/// (`#` starts a fragment, `"` closes the string). The payload is
/// percent-encoded; the prefix is kept verbatim. Any other URI is returned
/// unchanged.
#[must_use]
pub fn escape_svg_data_uri(uri: &str) -> Cow<'_, str> {
    match uri.strip_prefix(SVG_DATA_URI_PREFIX) {
        Some(payload) => Cow::Owned(format!(
            "{SVG_DATA_URI_PREFIX}{}",
            encode_uri_component(payload)
        )),
        None => Cow::Borrowed(uri),
    }
}

/// Whether `uri` uses the `data:` scheme.
#[must_use]
pub fn is_data_uri(uri: &str) -> bool {
    uri.get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

/// Strip query string (`?…`) and fragment identifier (`#…`) from a URL so
/// that the remaining path can be checked for a file extension.
///
/// [URL Standard § 4.1](https://url.spec.whatwg.org/#concept-url-path)
#[must_use]
pub fn strip_url_decorations(resolved: &str) -> &str {
    let without_fragment = resolved.split_once('#').map_or(resolved, |(b, _)| b);
    without_fragment
        .split_once('?')
        .map_or(without_fragment, |(b, _)| b)
}
