fn main() {
    if let Err(e) = camera_viewer_lib::run() {
        eprintln!("camera-viewer: {e}");
        std::process::exit(1);
    }
}
