//! Conversion between [`HttpProxy`] and [`GenericObject`].
//!
//! This is the only place the solver touches untyped objects; the locator
//! and orchestrator work with typed values throughout.

use kube::core::TypeMeta;
use serde_json::Value;

use crate::error::ConversionError;
use crate::httpproxy::HttpProxy;
use crate::object::GenericObject;

/// API version of Contour HTTPProxy objects
pub const HTTPPROXY_API_VERSION: &str = "projectcontour.io/v1";

/// Kind of Contour HTTPProxy objects
pub const HTTPPROXY_KIND: &str = "HTTPProxy";

/// Encode a typed HTTPProxy, stamping `apiVersion` and `kind`
pub fn encode(proxy: &HttpProxy) -> Result<GenericObject, ConversionError> {
    let Value::Object(mut data) = serde_json::to_value(proxy)? else {
        return Err(ConversionError::NotAnObject);
    };
    data.remove("metadata");

    let types = TypeMeta {
        api_version: HTTPPROXY_API_VERSION.to_string(),
        kind: HTTPPROXY_KIND.to_string(),
    };
    Ok(GenericObject::from_parts(
        Some(types),
        proxy.metadata.clone(),
        data,
    ))
}

/// Decode a generic object into a typed HTTPProxy.
///
/// Missing `apiVersion`/`kind` are accepted; present ones must name HTTPProxy.
pub fn decode(object: GenericObject) -> Result<HttpProxy, ConversionError> {
    check_type_field("apiVersion", object.api_version(), HTTPPROXY_API_VERSION)?;
    check_type_field("kind", object.kind(), HTTPPROXY_KIND)?;

    let (_, metadata, data) = object.into_parts()?;
    let mut proxy: HttpProxy = serde_json::from_value(Value::Object(data))?;
    proxy.metadata = metadata;
    Ok(proxy)
}

fn check_type_field(
    field: &'static str,
    actual: Option<&str>,
    expected: &'static str,
) -> Result<(), ConversionError> {
    match actual {
        Some(actual) if actual != expected => Err(ConversionError::TypeMismatch {
            field,
            expected,
            actual: actual.to_string(),
        }),
        _ => Ok(()),
    }
}
