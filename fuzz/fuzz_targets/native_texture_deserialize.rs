#![no_main]

// Feeds arbitrary bytes to the native texture reader with every codec registered.
// Malformed input must surface as an error, never as a panic.

use libfuzzer_sys::fuzz_target;
use rwtxd::{register_default_native_textures, Engine, Raster};
use std::io::Cursor;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    let engine = Engine::new();
    if register_default_native_textures(&engine).is_err() {
        return;
    }

    let engine = Arc::new(engine);
    let raster = Raster::new(&engine);
    if raster.deserialize(&mut Cursor::new(data.to_vec())).is_ok() {
        // Anything we managed to read must also be writable again.
        let mut out = Cursor::new(Vec::new());
        let _ = raster.serialize(&mut out);
    }
});
