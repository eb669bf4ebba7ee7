// ─── APMC Core ───
// Patch delivery and Forge server supervision for the Archipelago
// Minecraft client.
//
// Architecture:
//   core/
//     patch/      Patch container codec + delivery into APData/
//     version/    Dependency manifest with cache fallback
//     downloader/ Streaming downloads with SHA-256 validation
//     java/       Java discovery + Corretto installer
//     loaders/    Forge server installer
//     mods/       Randomizer mod synchronization
//     launch/     Heap/args assembly, server supervisor, log tailing
//     state/      Settings, variants and per-run state

pub mod downloader;
pub mod error;
pub mod http;
pub mod java;
pub mod launch;
pub mod license;
pub mod loaders;
pub mod mods;
pub mod patch;
pub mod prompt;
pub mod state;
pub mod version;
