use console::{StyledObject, style};
use std::fmt::Display;

pub fn ncyan<D: Display>(val: D) -> StyledObject<D> {
    style(val).cyan()
}

pub fn ngreen<D: Display>(val: D) -> StyledObject<D> {
    style(val).green()
}

pub fn nred<D: Display>(val: D) -> StyledObject<D> {
    style(val).red()
}

pub fn nyellow<D: Display>(val: D) -> StyledObject<D> {
    style(val).yellow()
}

/// "up" in green or "down" in red.
pub fn up_down(up: bool) -> StyledObject<&'static str> {
    if up { ngreen("up") } else { nred("down") }
}
