// Mon Feb 16 2026 - Alex

use libc::c_int;

pub const ERROR_SUCCESS: c_int = 0;
pub const ERROR_INSUFFICIENT_MEMORY: c_int = 1;
pub const ERROR_COULD_NOT_ATTACH_TO_PROCESS: c_int = 2;
pub const ERROR_COULD_NOT_OPEN_FILE: c_int = 3;
pub const ERROR_COULD_NOT_MAP_FILE: c_int = 4;
pub const ERROR_INVALID_FILE: c_int = 6;
pub const ERROR_CORRUPT_FILE: c_int = 7;
pub const ERROR_UNSUPPORTED_FILE_VERSION: c_int = 8;
pub const ERROR_INVALID_REGULAR_EXPRESSION: c_int = 9;
pub const ERROR_INVALID_HEX_STRING: c_int = 10;
pub const ERROR_SYNTAX_ERROR: c_int = 11;
pub const ERROR_LOOP_NESTING_LIMIT_EXCEEDED: c_int = 12;
pub const ERROR_DUPLICATED_LOOP_IDENTIFIER: c_int = 13;
pub const ERROR_DUPLICATED_IDENTIFIER: c_int = 14;
pub const ERROR_DUPLICATED_TAG_IDENTIFIER: c_int = 15;
pub const ERROR_DUPLICATED_META_IDENTIFIER: c_int = 16;
pub const ERROR_DUPLICATED_STRING_IDENTIFIER: c_int = 17;
pub const ERROR_UNREFERENCED_STRING: c_int = 18;
pub const ERROR_UNDEFINED_STRING: c_int = 19;
pub const ERROR_UNDEFINED_IDENTIFIER: c_int = 20;
pub const ERROR_MISPLACED_ANONYMOUS_STRING: c_int = 21;
pub const ERROR_INCLUDES_CIRCULAR_REFERENCE: c_int = 22;
pub const ERROR_INCLUDE_DEPTH_EXCEEDED: c_int = 23;
pub const ERROR_WRONG_TYPE: c_int = 24;
pub const ERROR_EXEC_STACK_OVERFLOW: c_int = 25;
pub const ERROR_SCAN_TIMEOUT: c_int = 26;
pub const ERROR_TOO_MANY_SCAN_THREADS: c_int = 27;
pub const ERROR_CALLBACK_ERROR: c_int = 28;
pub const ERROR_INVALID_ARGUMENT: c_int = 29;
pub const ERROR_TOO_MANY_MATCHES: c_int = 30;
pub const ERROR_INTERNAL_FATAL_ERROR: c_int = 31;
pub const ERROR_NESTED_FOR_OF_LOOP: c_int = 32;
pub const ERROR_INVALID_FIELD_NAME: c_int = 33;
pub const ERROR_UNKNOWN_MODULE: c_int = 34;
pub const ERROR_NOT_A_STRUCTURE: c_int = 35;
pub const ERROR_NOT_INDEXABLE: c_int = 36;
pub const ERROR_NOT_A_FUNCTION: c_int = 37;
pub const ERROR_INVALID_FORMAT: c_int = 38;
pub const ERROR_TOO_MANY_ARGUMENTS: c_int = 39;
pub const ERROR_WRONG_ARGUMENTS: c_int = 40;
pub const ERROR_WRONG_RETURN_TYPE: c_int = 41;
pub const ERROR_DUPLICATED_STRUCTURE_MEMBER: c_int = 42;
pub const ERROR_EMPTY_STRING: c_int = 43;
pub const ERROR_DIVISION_BY_ZERO: c_int = 44;
pub const ERROR_REGULAR_EXPRESSION_TOO_LARGE: c_int = 45;
pub const ERROR_TOO_MANY_RE_FIBERS: c_int = 46;
pub const ERROR_COULD_NOT_READ_PROCESS_MEMORY: c_int = 47;
pub const ERROR_INVALID_EXTERNAL_VARIABLE_TYPE: c_int = 48;
pub const ERROR_REGULAR_EXPRESSION_TOO_COMPLEX: c_int = 49;
pub const ERROR_INVALID_MODULE_NAME: c_int = 50;
pub const ERROR_TOO_MANY_STRINGS: c_int = 51;
pub const ERROR_INTEGER_OVERFLOW: c_int = 52;
pub const ERROR_CALLBACK_REQUIRED: c_int = 53;
pub const ERROR_INVALID_OPERAND: c_int = 54;
pub const ERROR_COULD_NOT_READ_FILE: c_int = 55;
pub const ERROR_DUPLICATED_EXTERNAL_VARIABLE: c_int = 56;
pub const ERROR_INVALID_MODULE_DATA: c_int = 57;
pub const ERROR_WRITING_FILE: c_int = 58;
pub const ERROR_INVALID_MODIFIER: c_int = 59;
pub const ERROR_DUPLICATED_MODIFIER: c_int = 60;
pub const ERROR_BLOCK_NOT_READY: c_int = 61;
pub const ERROR_INVALID_PERCENTAGE: c_int = 62;
pub const ERROR_IDENTIFIER_MATCHES_WILDCARD: c_int = 63;
pub const ERROR_INVALID_VALUE: c_int = 64;

pub fn error_message(code: c_int) -> Option<&'static str> {
    let msg = match code {
        ERROR_SUCCESS => "success",
        ERROR_INSUFFICIENT_MEMORY => "insufficient memory",
        ERROR_COULD_NOT_ATTACH_TO_PROCESS => "could not attach to process",
        ERROR_COULD_NOT_OPEN_FILE => "could not open file",
        ERROR_COULD_NOT_MAP_FILE => "could not map file",
        ERROR_INVALID_FILE => "invalid file",
        ERROR_CORRUPT_FILE => "corrupt file",
        ERROR_UNSUPPORTED_FILE_VERSION => "unsupported file version",
        ERROR_INVALID_REGULAR_EXPRESSION => "invalid regular expression",
        ERROR_INVALID_HEX_STRING => "invalid hex string",
        ERROR_SYNTAX_ERROR => "syntax error",
        ERROR_LOOP_NESTING_LIMIT_EXCEEDED => "loop nesting limit exceeded",
        ERROR_DUPLICATED_LOOP_IDENTIFIER => "duplicated loop identifier",
        ERROR_DUPLICATED_IDENTIFIER => "duplicated identifier",
        ERROR_DUPLICATED_TAG_IDENTIFIER => "duplicated tag identifier",
        ERROR_DUPLICATED_META_IDENTIFIER => "duplicated meta identifier",
        ERROR_DUPLICATED_STRING_IDENTIFIER => "duplicated string identifier",
        ERROR_UNREFERENCED_STRING => "unreferenced string",
        ERROR_UNDEFINED_STRING => "undefined string",
        ERROR_UNDEFINED_IDENTIFIER => "undefined identifier",
        ERROR_MISPLACED_ANONYMOUS_STRING => "misplaced anonymous string",
        ERROR_INCLUDES_CIRCULAR_REFERENCE => "includes circular reference",
        ERROR_INCLUDE_DEPTH_EXCEEDED => "include depth exceeded",
        ERROR_WRONG_TYPE => "wrong type",
        ERROR_EXEC_STACK_OVERFLOW => "exec stack overflow",
        ERROR_SCAN_TIMEOUT => "scan timeout",
        ERROR_TOO_MANY_SCAN_THREADS => "too many scan threads",
        ERROR_CALLBACK_ERROR => "callback error",
        ERROR_INVALID_ARGUMENT => "invalid argument",
        ERROR_TOO_MANY_MATCHES => "too many matches",
        ERROR_INTERNAL_FATAL_ERROR => "internal fatal error",
        ERROR_NESTED_FOR_OF_LOOP => "nested for of loop",
        ERROR_INVALID_FIELD_NAME => "invalid field name",
        ERROR_UNKNOWN_MODULE => "unknown module",
        ERROR_NOT_A_STRUCTURE => "not a structure",
        ERROR_NOT_INDEXABLE => "not indexable",
        ERROR_NOT_A_FUNCTION => "not a function",
        ERROR_INVALID_FORMAT => "invalid format",
        ERROR_TOO_MANY_ARGUMENTS => "too many arguments",
        ERROR_WRONG_ARGUMENTS => "wrong arguments",
        ERROR_WRONG_RETURN_TYPE => "wrong return type",
        ERROR_DUPLICATED_STRUCTURE_MEMBER => "duplicated structure member",
        ERROR_EMPTY_STRING => "empty string",
        ERROR_DIVISION_BY_ZERO => "division by zero",
        ERROR_REGULAR_EXPRESSION_TOO_LARGE => "regular expression too large",
        ERROR_TOO_MANY_RE_FIBERS => "too many regular expression fibers",
        ERROR_COULD_NOT_READ_PROCESS_MEMORY => "could not read process memory",
        ERROR_INVALID_EXTERNAL_VARIABLE_TYPE => "invalid external variable type",
        ERROR_REGULAR_EXPRESSION_TOO_COMPLEX => "regular expression too complex",
        ERROR_INVALID_MODULE_NAME => "invalid module name",
        ERROR_TOO_MANY_STRINGS => "too many strings",
        ERROR_INTEGER_OVERFLOW => "integer overflow",
        ERROR_CALLBACK_REQUIRED => "callback required",
        ERROR_INVALID_OPERAND => "invalid operand",
        ERROR_COULD_NOT_READ_FILE => "could not read file",
        ERROR_DUPLICATED_EXTERNAL_VARIABLE => "duplicated external variable",
        ERROR_INVALID_MODULE_DATA => "invalid module data",
        ERROR_WRITING_FILE => "error writing file",
        ERROR_INVALID_MODIFIER => "invalid modifier",
        ERROR_DUPLICATED_MODIFIER => "duplicated modifier",
        ERROR_BLOCK_NOT_READY => "block not ready",
        ERROR_INVALID_PERCENTAGE => "invalid percentage",
        ERROR_IDENTIFIER_MATCHES_WILDCARD => "identifier matches wildcard",
        ERROR_INVALID_VALUE => "invalid value",
        _ => return None,
    };
    Some(msg)
}
