/// Bundles the loopback plugin through nih_plug_xtask. Usage:
///
///   cargo xtask bundle delay-loopback --release
///
/// The plugin library ends up in `target/bundled/` as `Delay Loopback.clap`
/// and `Delay Loopback.vst3`, next to the standalone executable.
fn main() -> nih_plug_xtask::Result<()> {
    nih_plug_xtask::main()
}
