fn main() {
    println!("cargo:rerun-if-changed=../../sway-projects/tap-to-earn/src");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_FUEL");
    // the bindings are only generated when the Fuel backend is requested
    if std::env::var_os("CARGO_FEATURE_FUEL").is_none() {
        return;
    }
    build_tap_to_earn();
}

fn build_tap_to_earn() {
    const PATH: &str = "../../sway-projects/tap-to-earn/";
    // run forc build command
    let output = std::process::Command::new("forc")
        .arg("build")
        .arg("--release")
        .current_dir(PATH)
        .output()
        .expect("failed to execute process");
    if !output.status.success() {
        panic!(
            "forc build failed with status: {}\nstderr: {}\n",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}
