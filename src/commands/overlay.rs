//! User-holdings overlay commands (§4.5 "User-holdings overlay detail").

use tauri::command;

use crate::resolver::user_overlay;

#[command]
pub fn get_user_overlay_template() -> Result<String, String> {
    Ok(user_overlay::template())
}

#[command]
pub fn add_user_overlay_holdings(csv_content: String) -> Result<usize, String> {
    user_overlay::add_from_csv(&csv_content).map_err(|e| e.to_string())
}
