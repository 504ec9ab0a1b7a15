//! Diagnostic dumps of links, fragments, and composites.
//!
//! Each wrapper implements [`fmt::Display`] and renders a tab-indented tree,
//! nesting one level per container. Indentation stops growing at
//! [`DUMP_MAX_INDENT`] tabs. Block and scratch contents are shown as hex rows
//! of [`DUMP_BYTES_PER_LINE`] bytes.
//!
//! ```ignore
//! log::info!("{}", dump::merged(&composite, 0));
//! ```

use core::fmt;

use crate::compose::MergedFragment;
use crate::constants::{DUMP_BYTES_PER_LINE, DUMP_MAX_INDENT};
use crate::fragment::{Fragment, Link};
use crate::transform::{Phase, Transform};

const TABS: &str = "\t\t\t\t\t\t\t\t\t\t\t\t\t\t\t\t";

fn tabs(indent: usize) -> &'static str {
    &TABS[..indent.min(DUMP_MAX_INDENT)]
}

fn hex_rows(f: &mut fmt::Formatter<'_>, indent: usize, bytes: &[u8]) -> fmt::Result {
    for (row, chunk) in bytes.chunks(DUMP_BYTES_PER_LINE).enumerate() {
        write!(f, "{}data {:02x}:", tabs(indent), row * DUMP_BYTES_PER_LINE)?;
        for byte in chunk {
            write!(f, " {byte:02x}")?;
        }
        writeln!(f)?;
    }
    Ok(())
}

/// Dump of one link
#[derive(Debug, Clone, Copy)]
pub struct LinkDump<'a> {
    link: &'a Link,
    indent: usize,
}

/// Dump `link` at `indent`
#[must_use]
pub fn link(link: &Link, indent: usize) -> LinkDump<'_> {
    LinkDump { link, indent }
}

impl fmt::Display for LinkDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.indent + 1;
        writeln!(f, "{}dma_link at:\t{:p}", tabs(self.indent), self.link.cpu_ptr())?;
        writeln!(f, "{}dma_addr:\t{:08x}", tabs(inner), self.link.dma_addr())?;
        writeln!(f, "{}len:\t{}", tabs(inner), self.link.len())?;
        hex_rows(f, inner, self.link.bytes())
    }
}

/// Dump of a fragment and its links
#[derive(Debug, Clone, Copy)]
pub struct FragmentDump<'a> {
    fragment: &'a Fragment,
    indent: usize,
}

/// Dump `fragment` at `indent`
#[must_use]
pub fn fragment(fragment: &Fragment, indent: usize) -> FragmentDump<'_> {
    FragmentDump { fragment, indent }
}

impl fmt::Display for FragmentDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.indent + 1;
        writeln!(f, "{}dma_fragment size:\t{}", tabs(self.indent), self.fragment.size())?;
        match self.fragment.origin() {
            Some(tag) => writeln!(f, "{}cache:\t{}", tabs(inner), tag.cache().get())?,
            None => writeln!(f, "{}cache:\tnone", tabs(inner))?,
        }
        writeln!(f, "{}state:\t{:?}", tabs(inner), self.fragment.state())?;
        for l in self.fragment.links() {
            write!(f, "{}", link(l, inner))?;
        }
        Ok(())
    }
}

/// Dump of one transform
pub struct TransformDump<'a, C> {
    transform: &'a Transform<C>,
    indent: usize,
}

/// Dump `transform` at `indent`
#[must_use]
pub fn transform<C>(transform: &Transform<C>, indent: usize) -> TransformDump<'_, C> {
    TransformDump { transform, indent }
}

impl<C> fmt::Display for TransformDump<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.transform;
        writeln!(f, "{}transform:\t{}", tabs(self.indent), t.label())?;
        if let (Some(cache), Some(mark)) = (t.restore_cache(), t.splice_mark()) {
            writeln!(f, "{}cache:\t{}", tabs(self.indent), cache.name())?;
            writeln!(f, "{}links:\t{}", tabs(self.indent), mark.len())?;
            if let (Some(first), Some(last)) = (mark.first(), mark.last()) {
                writeln!(f, "{}range:\t{first:08x}..{last:08x}", tabs(self.indent))?;
            }
        }
        hex_rows(f, self.indent, t.scratch())
    }
}

/// Dump of a composite: its links, then its pre and post transforms
pub struct MergedDump<'a, C> {
    composite: &'a MergedFragment<C>,
    indent: usize,
}

/// Dump `composite` at `indent`
#[must_use]
pub fn merged<C>(composite: &MergedFragment<C>, indent: usize) -> MergedDump<'_, C> {
    MergedDump { composite, indent }
}

impl<C> fmt::Display for MergedDump<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.indent + 1;
        writeln!(f, "{}merged_fragment size:\t{}", tabs(self.indent), self.composite.size())?;
        for l in self.composite.links() {
            write!(f, "{}", link(l, inner))?;
        }

        for (phase, title) in [(Phase::Pre, "pre-DMA-Transform"), (Phase::Post, "post-DMA-Transform")] {
            writeln!(f, "{}{title}s:", tabs(inner))?;
            for (i, t) in self.composite.transforms(phase).iter().enumerate() {
                writeln!(f, "{}{title} {i}:", tabs(inner + 1))?;
                write!(f, "{}", transform(t, inner + 2))?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
