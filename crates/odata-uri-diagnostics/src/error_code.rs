//! OData URI error codes following a structured numbering system
//!
//! Error code ranges:
//! - ODU0001-ODU0099: Syntax errors (lexer, expression and option grammar)
//! - ODU0100-ODU0149: Limit errors (depth, node count, segment count)
//! - ODU0150-ODU0299: Binding errors (resolution, typing, functions)
//! - ODU0300-ODU0399: Path errors (segments, keys, casts)
//! - ODU0400-ODU0449: Select/expand errors
//! - ODU0450-ODU0499: Model errors (EDM loading and validation)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Error code identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode(u16);

impl ErrorCode {
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Get error information for this code
    pub fn info(&self) -> &'static ErrorInfo {
        ERROR_INFO.get(&self.0).unwrap_or(&UNKNOWN_ERROR)
    }

    pub const fn is_syntax_error(&self) -> bool {
        self.0 >= 1 && self.0 < 100
    }

    pub const fn is_limit_error(&self) -> bool {
        self.0 >= 100 && self.0 < 150
    }

    pub const fn is_binding_error(&self) -> bool {
        self.0 >= 150 && self.0 < 300
    }

    pub const fn is_path_error(&self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    pub const fn is_select_expand_error(&self) -> bool {
        self.0 >= 400 && self.0 < 450
    }

    pub const fn is_model_error(&self) -> bool {
        self.0 >= 450 && self.0 < 500
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ODU{:04}", self.0)
    }
}

/// Information about an error code
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Short description of the error
    pub description: &'static str,
    /// Detailed help text
    pub help: Option<&'static str>,
}

impl ErrorInfo {
    const fn new(description: &'static str) -> Self {
        Self {
            description,
            help: None,
        }
    }

    const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

static UNKNOWN_ERROR: ErrorInfo = ErrorInfo::new("Unknown error");

static ERROR_INFO: LazyLock<HashMap<u16, ErrorInfo>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // Syntax errors (0001-0099)
    map.insert(1, ErrorInfo::new("Unexpected token"));
    map.insert(2, ErrorInfo::new("Unexpected end of input"));
    map.insert(3, ErrorInfo::new("Invalid character"));
    map.insert(4, ErrorInfo::new("Invalid literal"));
    map.insert(5, ErrorInfo::new("Unrecognized literal prefix"));
    map.insert(6, ErrorInfo::new("Unterminated string literal")
        .with_help("Single quotes inside a string are written as two quotes: 'O''Neil'"));
    map.insert(7, ErrorInfo::new("Invalid number format"));
    map.insert(8, ErrorInfo::new("Invalid date/time format"));
    map.insert(9, ErrorInfo::new("Invalid GUID format"));
    map.insert(10, ErrorInfo::new("Invalid binary format"));
    map.insert(11, ErrorInfo::new("Missing closing parenthesis"));
    map.insert(12, ErrorInfo::new("Expected expression"));
    map.insert(13, ErrorInfo::new("Expected identifier"));
    map.insert(14, ErrorInfo::new("Invalid lambda expression"));
    map.insert(15, ErrorInfo::new("Invalid $orderby direction"));
    map.insert(16, ErrorInfo::new("Invalid query option"));
    map.insert(17, ErrorInfo::new("Duplicate query option"));
    map.insert(18, ErrorInfo::new("Invalid $count value")
        .with_help("$count accepts exactly 'true' or 'false'"));
    map.insert(19, ErrorInfo::new("Invalid $top/$skip value"));
    map.insert(20, ErrorInfo::new("Invalid expand option"));
    map.insert(21, ErrorInfo::new("Invalid key predicate"));
    map.insert(22, ErrorInfo::new("Invalid percent encoding"));
    map.insert(23, ErrorInfo::new("Request URI is not under the service root"));
    map.insert(24, ErrorInfo::new("Invalid URI"));

    // Limit errors (0100-0149)
    map.insert(100, ErrorInfo::new("Expression nesting too deep"));
    map.insert(101, ErrorInfo::new("Too many expression nodes"));
    map.insert(102, ErrorInfo::new("Too many path segments"));
    map.insert(103, ErrorInfo::new("Expand nesting too deep"));

    // Binding errors (0150-0299)
    map.insert(150, ErrorInfo::new("Unresolved identifier")
        .with_help("Check that the property exists on the type in scope"));
    map.insert(151, ErrorInfo::new("Incompatible operand types"));
    map.insert(152, ErrorInfo::new("No applicable function found"));
    map.insert(153, ErrorInfo::new("Ambiguous binding"));
    map.insert(154, ErrorInfo::new("Expression must be boolean"));
    map.insert(155, ErrorInfo::new("Invalid lambda source"));
    map.insert(156, ErrorInfo::new("Invalid property access"));
    map.insert(157, ErrorInfo::new("Invalid $count source"));
    map.insert(158, ErrorInfo::new("Unknown function"));
    map.insert(159, ErrorInfo::new("Invalid type name"));
    map.insert(160, ErrorInfo::new("Invalid operand"));

    // Path errors (0300-0399)
    map.insert(300, ErrorInfo::new("Unresolved path segment"));
    map.insert(301, ErrorInfo::new("Invalid type cast")
        .with_help("A cast target must derive from the type of the preceding segment"));
    map.insert(302, ErrorInfo::new("Key count mismatch"));
    map.insert(303, ErrorInfo::new("Key value type mismatch"));
    map.insert(304, ErrorInfo::new("Segment not allowed here"));
    map.insert(305, ErrorInfo::new("Unresolved batch reference"));
    map.insert(306, ErrorInfo::new("Invalid operation parameters"));
    map.insert(307, ErrorInfo::new("Invalid entity id"));
    map.insert(308, ErrorInfo::new("Empty path"));

    // Select/expand errors (0400-0449)
    map.insert(400, ErrorInfo::new("Invalid select path"));
    map.insert(401, ErrorInfo::new("Invalid expand path"));
    map.insert(402, ErrorInfo::new("Nested options on a non-navigation item"));

    // Model errors (0450-0499)
    map.insert(450, ErrorInfo::new("Model load failed"));
    map.insert(451, ErrorInfo::new("Unknown type in model"));
    map.insert(452, ErrorInfo::new("Invalid model element"));

    map
});

// Syntax errors
pub const ODU0001: ErrorCode = ErrorCode::new(1);
pub const ODU0002: ErrorCode = ErrorCode::new(2);
pub const ODU0003: ErrorCode = ErrorCode::new(3);
pub const ODU0004: ErrorCode = ErrorCode::new(4);
pub const ODU0005: ErrorCode = ErrorCode::new(5);
pub const ODU0006: ErrorCode = ErrorCode::new(6);
pub const ODU0007: ErrorCode = ErrorCode::new(7);
pub const ODU0008: ErrorCode = ErrorCode::new(8);
pub const ODU0009: ErrorCode = ErrorCode::new(9);
pub const ODU0010: ErrorCode = ErrorCode::new(10);
pub const ODU0011: ErrorCode = ErrorCode::new(11);
pub const ODU0012: ErrorCode = ErrorCode::new(12);
pub const ODU0013: ErrorCode = ErrorCode::new(13);
pub const ODU0014: ErrorCode = ErrorCode::new(14);
pub const ODU0015: ErrorCode = ErrorCode::new(15);
pub const ODU0016: ErrorCode = ErrorCode::new(16);
pub const ODU0017: ErrorCode = ErrorCode::new(17);
pub const ODU0018: ErrorCode = ErrorCode::new(18);
pub const ODU0019: ErrorCode = ErrorCode::new(19);
pub const ODU0020: ErrorCode = ErrorCode::new(20);
pub const ODU0021: ErrorCode = ErrorCode::new(21);
pub const ODU0022: ErrorCode = ErrorCode::new(22);
pub const ODU0023: ErrorCode = ErrorCode::new(23);
pub const ODU0024: ErrorCode = ErrorCode::new(24);

// Limit errors
pub const ODU0100: ErrorCode = ErrorCode::new(100);
pub const ODU0101: ErrorCode = ErrorCode::new(101);
pub const ODU0102: ErrorCode = ErrorCode::new(102);
pub const ODU0103: ErrorCode = ErrorCode::new(103);

// Binding errors
pub const ODU0150: ErrorCode = ErrorCode::new(150);
pub const ODU0151: ErrorCode = ErrorCode::new(151);
pub const ODU0152: ErrorCode = ErrorCode::new(152);
pub const ODU0153: ErrorCode = ErrorCode::new(153);
pub const ODU0154: ErrorCode = ErrorCode::new(154);
pub const ODU0155: ErrorCode = ErrorCode::new(155);
pub const ODU0156: ErrorCode = ErrorCode::new(156);
pub const ODU0157: ErrorCode = ErrorCode::new(157);
pub const ODU0158: ErrorCode = ErrorCode::new(158);
pub const ODU0159: ErrorCode = ErrorCode::new(159);
pub const ODU0160: ErrorCode = ErrorCode::new(160);

// Path errors
pub const ODU0300: ErrorCode = ErrorCode::new(300);
pub const ODU0301: ErrorCode = ErrorCode::new(301);
pub const ODU0302: ErrorCode = ErrorCode::new(302);
pub const ODU0303: ErrorCode = ErrorCode::new(303);
pub const ODU0304: ErrorCode = ErrorCode::new(304);
pub const ODU0305: ErrorCode = ErrorCode::new(305);
pub const ODU0306: ErrorCode = ErrorCode::new(306);
pub const ODU0307: ErrorCode = ErrorCode::new(307);
pub const ODU0308: ErrorCode = ErrorCode::new(308);

// Select/expand errors
pub const ODU0400: ErrorCode = ErrorCode::new(400);
pub const ODU0401: ErrorCode = ErrorCode::new(401);
pub const ODU0402: ErrorCode = ErrorCode::new(402);

// Model errors
pub const ODU0450: ErrorCode = ErrorCode::new(450);
pub const ODU0451: ErrorCode = ErrorCode::new(451);
pub const ODU0452: ErrorCode = ErrorCode::new(452);
