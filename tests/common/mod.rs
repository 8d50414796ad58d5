#![allow(dead_code)]

pub(crate) mod logging;

pub(crate) mod players;
