// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::env;

fn main() {
    println!("cargo:rerun-if-changed=src/rade_shim.c");
    println!("cargo:rerun-if-env-changed=RADE_DIR");

    if env::var_os("CARGO_FEATURE_LIBRADE").is_none() {
        return;
    }

    let rade_dir = env::var("RADE_DIR").unwrap_or_else(|_| "../../external/radae".into());

    cc::Build::new()
        .include(format!("{rade_dir}/src"))
        .include(format!("{rade_dir}/opus"))
        .include(format!("{rade_dir}/opus/dnn"))
        .file("src/rade_shim.c")
        .flag_if_supported("-std=c99")
        .compile("radae_rade_shim");

    println!("cargo:rustc-link-lib=rade");
    println!("cargo:rustc-link-lib=opus");
    println!("cargo:rustc-link-lib=m");
}
