//! Tauri command surface: thin `#[tauri::command]` wrappers over the six core components
//! (§2.1 ambient stack). Grounded on the teacher's `src/commands/quotes.rs` and
//! `src/commands/csv.rs` (async command shape, `Result<T, String>`, `.map_err(|e| e.to_string())`
//! at the outermost edge only, `log::warn!` on recoverable failure).

pub mod analysis;
pub mod diagnostics;
pub mod fund_detail;
pub mod overlay;
pub mod ticker_cache;
