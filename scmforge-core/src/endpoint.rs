//! URL construction for the config API.
//!
//! All endpoints live under `{base}/sse/config/v1/`.

use thiserror::Error;
use url::Url;

use crate::model::ObjectType;

/// Production API host.
pub const DEFAULT_API_BASE_URL: &str = "https://api.sase.paloaltonetworks.com";

const API_ROOT: [&str; 3] = ["sse", "config", "v1"];

/// Error building an endpoint URL.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The base URL could not be parsed.
    #[error("invalid base URL {url}: {source}")]
    InvalidBase {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The base URL cannot have path segments appended (e.g. `mailto:`).
    #[error("base URL cannot be used as an API root: {0}")]
    CannotBeABase(String),

    /// A caller-supplied path does not form a valid URL with the base.
    #[error("invalid endpoint path {path}: {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: url::ParseError,
    },
}

/// Parse and validate an API base URL.
pub fn parse_base(base: &str) -> Result<Url, EndpointError> {
    let url = Url::parse(base).map_err(|source| EndpointError::InvalidBase {
        url: base.to_string(),
        source,
    })?;
    if url.cannot_be_a_base() {
        return Err(EndpointError::CannotBeABase(base.to_string()));
    }
    Ok(url)
}

fn api_url(base: &Url, segments: &[&str]) -> Result<Url, EndpointError> {
    let mut url = base.clone();
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|_| EndpointError::CannotBeABase(base.to_string()))?
        .pop_if_empty()
        .extend(API_ROOT)
        .extend(segments);
    Ok(url)
}

/// Build the create endpoint for an object type in a folder.
///
/// `extra_params` is a raw query fragment such as `position=pre&`; its pairs are
/// placed ahead of `type=container&folder={folder}`.
pub fn build_endpoint(
    base: &Url,
    object_type: ObjectType,
    folder: &str,
    extra_params: &str,
) -> Result<Url, EndpointError> {
    let mut url = api_url(base, &[object_type.as_str()])?;
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in url::form_urlencoded::parse(extra_params.as_bytes()) {
            query.append_pair(&key, &value);
        }
        query.append_pair("type", "container");
        query.append_pair("folder", folder);
    }
    Ok(url)
}

/// Build the move endpoint for a security rule.
pub fn move_endpoint(base: &Url, rule_id: &str) -> Result<Url, EndpointError> {
    let action = format!("{}:move", rule_id);
    api_url(base, &[ObjectType::SecurityRules.as_str(), &action])
}

/// Append a raw path and query such as
/// `/sse/config/v1/addresses?name=web&folder=Shared` to the base.
pub fn object_endpoint(base: &Url, path: &str) -> Result<Url, EndpointError> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|source| EndpointError::InvalidPath {
        path: path.to_string(),
        source,
    })
}

/// Build one page of the list endpoint.
pub fn list_endpoint(
    base: &Url,
    object_type: ObjectType,
    folder: &str,
    position: Option<&str>,
    limit: u32,
    offset: u32,
) -> Result<Url, EndpointError> {
    let mut url = api_url(base, &[object_type.as_str()])?;
    {
        let mut query = url.query_pairs_mut();
        if let Some(position) = position {
            query.append_pair("position", position);
        }
        query.append_pair("folder", folder);
        query.append_pair("limit", &limit.to_string());
        query.append_pair("offset", &offset.to_string());
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        parse_base(DEFAULT_API_BASE_URL).unwrap()
    }

    #[test]
    fn test_build_endpoint() {
        let url = build_endpoint(&base(), ObjectType::Tags, "Shared", "").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.sase.paloaltonetworks.com/sse/config/v1/tags?type=container&folder=Shared"
        );
    }

    #[test]
    fn test_build_endpoint_with_extra_params() {
        let url = build_endpoint(
            &base(),
            ObjectType::SecurityRules,
            "Mobile Users",
            "position=pre&",
        )
        .unwrap();
        assert_eq!(url.path(), "/sse/config/v1/security-rules");
        assert_eq!(url.query(), Some("position=pre&type=container&folder=Mobile+Users"));
    }

    #[test]
    fn test_base_with_trailing_slash() {
        let base = parse_base("http://127.0.0.1:8080/").unwrap();
        let url = build_endpoint(&base, ObjectType::Addresses, "Shared", "").unwrap();
        assert_eq!(url.path(), "/sse/config/v1/addresses");
    }

    #[test]
    fn test_move_endpoint() {
        let url = move_endpoint(&base(), "8c1e2d0a-1111").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.sase.paloaltonetworks.com/sse/config/v1/security-rules/8c1e2d0a-1111:move"
        );
    }

    #[test]
    fn test_list_endpoint() {
        let url = list_endpoint(&base(), ObjectType::SecurityRules, "Shared", Some("post"), 200, 400)
            .unwrap();
        assert_eq!(url.query(), Some("position=post&folder=Shared&limit=200&offset=400"));
    }

    #[test]
    fn test_object_endpoint_keeps_query() {
        let url = object_endpoint(&base(), "/sse/config/v1/addresses?name=web&folder=Shared")
            .unwrap();
        assert_eq!(url.path(), "/sse/config/v1/addresses");
        assert_eq!(url.query(), Some("name=web&folder=Shared"));

        let nested = parse_base("http://127.0.0.1:8080/proxy/").unwrap();
        let url = object_endpoint(&nested, "sse/config/v1/tags").unwrap();
        assert_eq!(url.path(), "/proxy/sse/config/v1/tags");
    }

    #[test]
    fn test_invalid_base() {
        assert!(matches!(
            parse_base("not a url"),
            Err(EndpointError::InvalidBase { .. })
        ));
        assert!(matches!(
            parse_base("mailto:ops@example.com"),
            Err(EndpointError::CannotBeABase(_))
        ));
    }
}
