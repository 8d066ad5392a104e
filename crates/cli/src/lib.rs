pub mod commands;

pub const ZKV_VERSION_MESSAGE: &str = concat!(
    "zkv-attest",
    " (",
    env!("VERGEN_GIT_SHA"),
    " ",
    env!("VERGEN_BUILD_TIMESTAMP"),
    ")"
);
