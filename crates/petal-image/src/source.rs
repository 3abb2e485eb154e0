//! The polymorphic `source` prop and the request it resolves into.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Opaque handle of an asset registered at build time.
///
/// Handles are 1-based: the first registered asset is `AssetId(1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub usize);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a request interacts with caches.
///
/// [Fetch Standard § 5.3 Request class](https://fetch.spec.whatwg.org/#dom-request-cache)
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CachePolicy {
    /// Use whatever cached copy is available, fetching otherwise.
    #[default]
    Default,
    /// Always go to the network.
    Reload,
    /// Prefer a cached copy even if stale.
    ForceCache,
    /// Never go to the network.
    OnlyIfCached,
}

impl CachePolicy {
    /// The `Cache-Control` request header that expresses this policy, if any.
    #[must_use]
    pub const fn cache_control(self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::Reload => Some("no-cache"),
            Self::ForceCache => Some("max-stale"),
            Self::OnlyIfCached => Some("only-if-cached"),
        }
    }
}

/// An explicit source object: a URI plus optional size hints and request
/// options.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    /// Location of the image. Used verbatim.
    #[serde(default)]
    pub uri: String,
    /// Intrinsic width hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Intrinsic height hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Pixel density of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    /// Extra HTTP headers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// HTTP method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// HTTP request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Cache policy.
    #[serde(default)]
    pub cache: CachePolicy,
}

impl SourceDescriptor {
    /// A descriptor with only a URI.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Attach intrinsic size hints.
    #[must_use]
    pub const fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

/// What to show: exactly one of a registered asset, a bare URI, a
/// descriptor, or a list of descriptors.
///
/// Deserializes from the JSON shapes a host would pass: a number, a
/// string, an object, or an array of objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Source {
    /// A build-time registered asset.
    Handle(AssetId),
    /// A URI string.
    Uri(String),
    /// A single descriptor.
    Descriptor(SourceDescriptor),
    /// Multi-resolution candidates. Only the first one is ever used.
    Descriptors(Vec<SourceDescriptor>),
}

impl From<AssetId> for Source {
    fn from(id: AssetId) -> Self {
        Self::Handle(id)
    }
}

impl From<&str> for Source {
    fn from(uri: &str) -> Self {
        Self::Uri(uri.to_string())
    }
}

impl From<String> for Source {
    fn from(uri: String) -> Self {
        Self::Uri(uri)
    }
}

impl From<SourceDescriptor> for Source {
    fn from(descriptor: SourceDescriptor) -> Self {
        Self::Descriptor(descriptor)
    }
}

impl From<Vec<SourceDescriptor>> for Source {
    fn from(descriptors: Vec<SourceDescriptor>) -> Self {
        Self::Descriptors(descriptors)
    }
}

/// A concrete, fetchable request handed to the image loader.
///
/// Two requests denote the same load when their `uri`s are equal; the
/// remaining fields travel with the request but do not affect identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRequest {
    /// The resolved URI.
    pub uri: String,
    /// HTTP method, if not `GET`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Extra HTTP headers, in name order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
    /// HTTP request body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Cache policy.
    pub cache: CachePolicy,
}

impl ImageRequest {
    /// A plain request for `uri`.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            method: None,
            headers: Vec::new(),
            body: None,
            cache: CachePolicy::Default,
        }
    }

    /// A request for `uri` carrying the options of `descriptor`.
    #[must_use]
    pub fn with_options(uri: String, descriptor: &SourceDescriptor) -> Self {
        Self {
            uri,
            method: descriptor.method.clone(),
            headers: descriptor
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            body: descriptor.body.clone(),
            cache: descriptor.cache,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_source_deserializes_every_shape() {
        let handle: Source = serde_json::from_str("3").unwrap();
        assert_eq!(handle, Source::Handle(AssetId(3)));

        let uri: Source = serde_json::from_str(r#""https://a/b.png""#).unwrap();
        assert_eq!(uri, Source::Uri("https://a/b.png".to_string()));

        let descriptor: Source = serde_json::from_str(
            r#"{"uri": "https://a/b.png", "width": 10, "height": 20, "cache": "only-if-cached"}"#,
        )
        .unwrap();
        assert_eq!(
            descriptor,
            Source::Descriptor(SourceDescriptor {
                cache: CachePolicy::OnlyIfCached,
                ..SourceDescriptor::new("https://a/b.png").with_size(10.0, 20.0)
            })
        );

        let list: Source =
            serde_json::from_str(r#"[{"uri": "a.png", "scale": 1}, {"uri": "b.png", "scale": 2}]"#)
                .unwrap();
        assert!(matches!(list, Source::Descriptors(ref d) if d.len() == 2));
    }

    #[test]
    fn test_cache_policy_names() {
        assert_eq!(CachePolicy::ForceCache.to_string(), "force-cache");
        assert_eq!(
            "only-if-cached".parse::<CachePolicy>().unwrap(),
            CachePolicy::OnlyIfCached
        );
        assert_eq!(CachePolicy::Default.cache_control(), None);
        assert_eq!(CachePolicy::Reload.cache_control(), Some("no-cache"));

        // strum and serde agree on every name.
        for policy in CachePolicy::iter() {
            let json = serde_json::to_string(&policy).unwrap();
            assert_eq!(json, format!("\"{policy}\""));
            assert_eq!(policy.as_ref().parse::<CachePolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn test_request_carries_descriptor_options() {
        let mut descriptor = SourceDescriptor::new("https://a/b.png");
        descriptor.method = Some("POST".to_string());
        descriptor.body = Some("q=1".to_string());
        let _ = descriptor
            .headers
            .insert("Authorization".to_string(), "Bearer t".to_string());

        let request = ImageRequest::with_options(descriptor.uri.clone(), &descriptor);
        assert_eq!(request.uri, "https://a/b.png");
        assert_eq!(request.method.as_deref(), Some("POST"));
        assert_eq!(request.body.as_deref(), Some("q=1"));
        assert_eq!(
            request.headers,
            vec![("Authorization".to_string(), "Bearer t".to_string())]
        );
    }
}
