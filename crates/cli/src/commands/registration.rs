use dabini_discord::commands::registration_payload;

use super::CommandResult;

/// Prints the body sent to `PUT /applications/{id}/commands` on READY.
pub fn run() -> CommandResult {
    match serde_json::to_string_pretty(&registration_payload()) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("commands", "serialization", error.to_string(), 1),
    }
}
