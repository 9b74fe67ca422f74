use crate::handler::InboundRequest;

pub const ALLOW_HEADERS: &str = "Content-Type,Authorization";
pub const ALLOW_METHODS: &str = "OPTIONS,POST,GET";

/// Origin allow-list. The first entry doubles as the value echoed back for
/// origins that are not on the list.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

/// CORS headers attached to a single response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsDecision {
    pub allow_origin: String,
    pub allow_headers: &'static str,
    pub allow_methods: &'static str,
}

impl OriginPolicy {
    pub fn new(allowed: Vec<String>) -> Self {
        let allowed = if allowed.is_empty() {
            vec!["*".to_owned()]
        } else {
            allowed
        };

        OriginPolicy { allowed }
    }

    pub fn allow_origin<'a>(&'a self, origin: &'a str) -> &'a str {
        if self.allowed.iter().any(|allowed| allowed == origin) {
            origin
        } else {
            &self.allowed[0]
        }
    }

    pub fn decide(&self, request: &InboundRequest) -> CorsDecision {
        let origin = request.header("Origin").unwrap_or("");

        CorsDecision {
            allow_origin: self.allow_origin(origin).to_owned(),
            allow_headers: ALLOW_HEADERS,
            allow_methods: ALLOW_METHODS,
        }
    }
}

impl CorsDecision {
    pub fn headers(&self) -> [(&'static str, String); 3] {
        [
            ("Access-Control-Allow-Origin", self.allow_origin.clone()),
            ("Access-Control-Allow-Headers", self.allow_headers.to_owned()),
            ("Access-Control-Allow-Methods", self.allow_methods.to_owned()),
        ]
    }
}
