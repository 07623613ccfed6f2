//! エラーメッセージ定数

/// 未知のコマンドのエラーメッセージ
pub const ERR_UNKNOWN_COMMAND: &str = "Unknown command";

/// 式が与えられていない場合のエラーメッセージ
pub const ERR_MISSING_EXPRESSION: &str = "Missing expression";

/// 引数が足りない場合のエラーメッセージ
pub const ERR_MISSING_ARGUMENT: &str = "Missing argument";

/// `info` の対象が不正な場合のエラーメッセージ
pub const ERR_INFO_TARGET: &str = "info what? 'r' (registers) or 'w' (watchpoints)";
