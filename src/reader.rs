//! Page-level stream engine: packet assembly and positioning
//!
//! `PageStream` owns the byte source and the per-page cursor state. It
//! turns the page/lacing structure into logical packets, stitching
//! fragments across page boundaries, and handles all byte-level
//! repositioning: landing on page boundaries, re-deriving the previous
//! page's granule position after a jump, and the one-time table of
//! contents scan.

use crate::clock::GranuleClock;
use crate::error::{Error, Result};
use crate::page::{self, Page};
use crate::source::ByteSource;
use crate::toc::{Toc, TocEntry};
use crate::util::{Buffer, BufferRef};
use tracing::{debug, trace};

/// Hard bound on a reassembled packet; larger packets are malformed
pub const MAX_PACKET_SIZE: usize = 16 * 1024 * 1024;

/// Distance of each backward probe when locating the previous page
const PREV_PAGE_STEP: u64 = 5000;

/// A reassembled packet plus the page context it completed under.
///
/// The codec layer turns this into a public [`crate::Packet`] once it
/// has computed a presentation timestamp.
#[derive(Debug)]
pub struct RawPacket {
    /// Packet payload
    pub data: Buffer,
    /// Valid sample count; set on the first packet completed per page
    pub valid_samples: Option<u64>,
    /// Byte offset of the page the packet completed on
    pub page_offset: u64,
    /// Granule position of that page
    pub page_granule: u64,
    /// Samples elapsed on that page (granule delta to the previous page)
    pub page_samples: u64,
    /// Sequence number of that page
    pub page_sequence: u32,
}

/// Packet assembler and positioning engine over one logical bitstream
pub struct PageStream<S: ByteSource> {
    source: S,
    /// Offset of the current page
    offset: u64,
    /// Total byte size of the current page (0 before the first read)
    page_size: u64,
    /// Current page header; empty placeholder before the first read
    page: Page,
    /// Cursor into the current page's segment table
    next_lace_index: usize,
    /// Whether the next completed packet is the first on its page
    first_packet_in_page: bool,
    /// Granule delta between the current page and its predecessor
    page_samples: u64,
    /// Granule position of the previously read page
    prev_granule: u64,
    /// Offset of the first page after the codec headers
    first_data_offset: u64,
    /// Page index for seeking; empty until built
    toc: Toc,
}

impl<S: ByteSource> PageStream<S> {
    /// Create an engine positioned at the start of the stream
    pub fn new(source: S) -> Self {
        PageStream {
            source,
            offset: 0,
            page_size: 0,
            page: Page::empty(),
            next_lace_index: 0,
            first_packet_in_page: false,
            page_samples: 0,
            prev_granule: 0,
            first_data_offset: 0,
            toc: Toc::new(),
        }
    }

    /// Rewind to offset 0 and discard all cursor state (codec re-probe)
    pub fn reset(&mut self) {
        self.offset = 0;
        self.page_size = 0;
        self.page = Page::empty();
        self.next_lace_index = 0;
        self.first_packet_in_page = false;
        self.page_samples = 0;
        self.prev_granule = 0;
        self.first_data_offset = 0;
        self.toc = Toc::new();
    }

    /// Record that the codec headers end with the current page; the
    /// next page is the first data page
    pub fn mark_first_data_offset(&mut self) {
        self.first_data_offset = self.offset + self.page_size;
    }

    /// Offset of the first data page
    pub fn first_data_offset(&self) -> u64 {
        self.first_data_offset
    }

    /// Offset of the current page
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Size of the underlying source, if known
    pub fn source_size(&self) -> Option<u64> {
        self.source.size()
    }

    /// Whether the underlying source is caching/live
    pub fn is_caching_source(&self) -> bool {
        self.source.is_caching()
    }

    /// The table of contents (empty until [`Self::build_toc`] runs)
    pub fn toc(&self) -> &Toc {
        &self.toc
    }

    /// Assemble and return the next logical packet.
    ///
    /// Packet fragments are accumulated across pages per the lacing
    /// rules: a lace of 255 continues the packet, any smaller value
    /// (zero included) terminates it. A page whose continuation flag is
    /// clear completes any packet still pending from the previous page.
    pub fn read_next_packet(&mut self) -> Result<RawPacket> {
        let mut partial: Option<BufferRef> = None;

        loop {
            let mut packet_size = 0usize;
            let mut got_full_packet = false;
            let mut next_index = self.next_lace_index;
            while next_index < self.page.segment_count as usize {
                let lace = self.page.lace[next_index];
                packet_size += lace as usize;
                next_index += 1;
                if lace < 255 {
                    got_full_packet = true;
                    break;
                }
            }

            if self.next_lace_index < self.page.segment_count as usize {
                let mut data_offset = self.offset + self.page.payload_offset();
                for j in 0..self.next_lace_index {
                    data_offset += self.page.lace[j] as u64;
                }

                let accumulated = partial.as_ref().map_or(0, |b| b.len());
                if accumulated + packet_size > MAX_PACKET_SIZE {
                    // Anti-DoS bound; drop the partial data rather than
                    // truncating it silently
                    return Err(Error::malformed(format!(
                        "packet exceeds {} bytes",
                        MAX_PACKET_SIZE
                    )));
                }

                let mut buf = partial
                    .take()
                    .unwrap_or_else(|| BufferRef::with_capacity(packet_size));
                if packet_size > 0 {
                    let mut chunk = vec![0u8; packet_size];
                    let n = self.source.read_at(data_offset, &mut chunk)?;
                    if n < packet_size {
                        return Err(Error::short_read(packet_size, n));
                    }
                    buf.extend_from_slice(&chunk);
                }
                self.next_lace_index = next_index;

                if got_full_packet {
                    return Ok(self.finish_packet(buf));
                }
                // The buffer now holds the start of a packet that
                // continues on the next page
                partial = Some(buf);
            }

            // Current page exhausted; advance to the next one
            self.offset += self.page_size;
            let next = page::read_page(&mut self.source, self.offset)?;
            trace!(
                offset = self.offset,
                granule = next.granule_position,
                sequence = next.sequence_number,
                "advanced to page"
            );

            self.page_samples = next.granule_position.saturating_sub(self.prev_granule);
            self.prev_granule = next.granule_position;
            self.page_size = next.size;
            self.next_lace_index = 0;
            self.first_packet_in_page = true;
            self.page = next;

            if let Some(buf) = partial.take() {
                if !self.page.is_continuation() {
                    // The new page does not continue the packet, so the
                    // accumulated bytes already form a complete one
                    return Ok(self.finish_packet(buf));
                }
                partial = Some(buf);
            }
        }
    }

    fn finish_packet(&mut self, buf: BufferRef) -> RawPacket {
        let valid_samples = if self.first_packet_in_page {
            self.first_packet_in_page = false;
            Some(self.page_samples)
        } else {
            None
        };
        RawPacket {
            data: buf.freeze(),
            valid_samples,
            page_offset: self.offset,
            page_granule: self.page.granule_position,
            page_samples: self.page_samples,
            page_sequence: self.page.sequence_number,
        }
    }

    /// Land on the page boundary at or after `offset` and reset the
    /// packet cursor there.
    ///
    /// The previous page's granule position is re-derived so the first
    /// packet read afterwards carries a correct valid-sample count.
    pub fn seek_to_offset(&mut self, offset: u64) -> Result<()> {
        let offset = offset.max(self.first_data_offset);
        let page_offset = page::find_next_page(&mut self.source, offset)?;
        let prev_granule = self.find_prev_granule_position(page_offset)?;
        debug!(
            target_offset = offset,
            page_offset, prev_granule, "seek landed"
        );

        self.offset = page_offset;
        self.page_size = 0;
        self.page = Page::empty();
        self.next_lace_index = 0;
        self.first_packet_in_page = true;
        self.page_samples = 0;
        self.prev_granule = prev_granule;
        Ok(())
    }

    /// Granule position of the last page that ends at or before
    /// `page_offset`.
    ///
    /// Backs up in fixed steps until a page strictly before
    /// `page_offset` is found (backing up further when a probe lands on
    /// the last page or beyond), then replays forward to just before
    /// `page_offset`. Also used with the source size as `page_offset`
    /// to find the stream's final granule position.
    pub fn find_prev_granule_position(&mut self, page_offset: u64) -> Result<u64> {
        if page_offset == 0 {
            return Ok(0);
        }

        let mut prev_guess = page_offset;
        let mut prev_page_offset;
        loop {
            prev_guess = prev_guess.saturating_sub(PREV_PAGE_STEP);
            trace!(prev_guess, "probing for previous page");
            match page::find_next_page(&mut self.source, prev_guess) {
                Ok(found) => prev_page_offset = found,
                Err(Error::EndOfStream) if prev_guess > 0 => {
                    // Probe landed inside the stream tail; back up more
                    continue;
                }
                Err(Error::EndOfStream) => return Ok(0),
                Err(e) => return Err(e),
            }
            if prev_page_offset < page_offset || prev_guess == 0 {
                break;
            }
        }

        if prev_page_offset >= page_offset {
            // No page precedes the landing offset
            return Ok(0);
        }

        let mut granule = 0;
        let mut offset = prev_page_offset;
        while offset < page_offset {
            let page = page::read_page(&mut self.source, offset)?;
            granule = page.granule_position;
            offset += page.size;
        }
        Ok(granule)
    }

    /// One-time linear scan recording one TOC entry per data page,
    /// decimated to the fixed memory budget afterwards.
    pub fn build_toc(&mut self, clock: &dyn GranuleClock) -> Result<()> {
        let mut toc = Toc::new();
        let mut offset = self.first_data_offset;
        loop {
            match page::read_page(&mut self.source, offset) {
                Ok(page) => {
                    toc.push(TocEntry {
                        page_offset: offset,
                        time_us: clock.time_us_of_granule(page.granule_position),
                    });
                    offset += page.size;
                }
                Err(Error::EndOfStream) => break,
                Err(e) => return Err(e),
            }
        }
        let scanned = toc.len();
        toc.thin(Toc::max_entries());
        debug!(
            pages = scanned,
            entries = toc.len(),
            "table of contents built"
        );
        self.toc = toc;
        Ok(())
    }
}
