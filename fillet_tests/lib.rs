extern crate cfg_if;

use cfg_if::cfg_if;

#[cfg(test)]
#[macro_use]
mod common;

cfg_if! {
    if #[cfg(test)] {
        extern crate encoding;
        extern crate fillet;
        extern crate fillet_driver;
        extern crate flate2;
        extern crate json;
        extern crate rand;

        mod admission;
        mod bench;
        mod cli;
        mod concurrent;
        mod pipeline;
        mod ram_buffer;
        mod sources;
        mod stream;
        mod throttle;
    }
}
