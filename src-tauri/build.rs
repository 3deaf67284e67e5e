//! Build script: generates Tauri's context (config, capabilities, icons).

fn main() {
    tauri_build::build();
}
