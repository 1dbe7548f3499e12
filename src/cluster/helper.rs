//! The cluster helper: groups packets into blocks and blocks into
//! clusters, sets durations, renders clusters and rotates output files.

use std::rc::Rc;

use tracing::{debug, trace};

use super::render::{must_duration_be_set, set_duration, RenderGroup};
use super::split::{SplitKind, SplitPoint};
use super::{ClusterContents, MAX_CLUSTER_CONTENT_SIZE};
use crate::config::MuxConfig;
use crate::ebml::{BlockBlobType, ClusterElement, CueSink, NullCues, SegmentOutput};
use crate::error::{MuxError, MuxResult};
use crate::packet::Packet;
use crate::source::{CueStrategy, SourceRef, TrackType};
use crate::timecode::round_to_scale;

/// Fallback slack for matching reference timecodes, in nanoseconds, used
/// when a source does not declare its own tolerance.
const DEFAULT_REFERENCE_TOLERANCE: i64 = 10_000;

/// Minimum gap between sparse audio cue entries, in nanoseconds.
const SPARSE_CUE_INTERVAL: i64 = 2_000_000_000;

/// Orchestrates packet ingestion, cluster boundaries, rendering, cue
/// generation, reference bookkeeping and file splitting.
///
/// Packets are appended to the active (last) cluster until one of the
/// boundary rules closes it; rendered clusters stay retained until no
/// live packet references into them anymore.
pub struct ClusterHelper {
    cfg: MuxConfig,

    clusters: Vec<ClusterContents>,
    out: Option<Box<dyn SegmentOutput>>,
    cues: Box<dyn CueSink>,

    split_points: Vec<SplitPoint>,
    current_split_point: usize,
    video_track_present: bool,

    /// Payload bytes accumulated in the active cluster.
    cluster_content_size: i64,
    min_timecode_in_cluster: i64,
    max_timecode_in_cluster: i64,

    max_timecode_and_duration: i64,
    last_cluster_tc: i64,
    num_cue_elements: u32,
    /// Fixed per-file cost preceding the first cluster; -1 until measured
    /// at the first render of a splitting run.
    header_overhead: i64,
    packet_num: u64,
    timecode_offset: i64,
    first_timecode_in_file: i64,
    bytes_in_file: i64,
}

impl ClusterHelper {
    pub fn new(cfg: MuxConfig) -> Self {
        ClusterHelper {
            cfg,
            clusters: Vec::new(),
            out: None,
            cues: Box::new(NullCues),
            split_points: Vec::new(),
            current_split_point: 0,
            video_track_present: false,
            cluster_content_size: 0,
            min_timecode_in_cluster: -1,
            max_timecode_in_cluster: -1,
            max_timecode_and_duration: 0,
            last_cluster_tc: 0,
            num_cue_elements: 0,
            header_overhead: -1,
            packet_num: 0,
            timecode_offset: 0,
            first_timecode_in_file: -1,
            bytes_in_file: 0,
        }
    }

    /// Bind the segment-level output. Required before the first packet.
    pub fn set_output(&mut self, out: Box<dyn SegmentOutput>) {
        self.out = Some(out);
    }

    /// Replace the cue sink (defaults to a no-op sink).
    pub fn set_cue_sink(&mut self, cues: Box<dyn CueSink>) {
        self.cues = cues;
    }

    /// Tell the helper whether any video track feeds this session; split
    /// decisions and sparse audio cues depend on it.
    pub fn set_video_track_present(&mut self, present: bool) {
        self.video_track_present = present;
    }

    /// Register a split trigger. Registration rewinds the active split
    /// point to the start of the list.
    pub fn add_split_point(&mut self, split_point: SplitPoint) {
        self.split_points.push(split_point);
        self.current_split_point = 0;
    }

    fn splitting(&self) -> bool {
        !self.split_points.is_empty()
    }

    /// Ingest one packet, closing and rendering clusters and rotating
    /// output files as the boundary rules dictate.
    pub fn add_packet(&mut self, mut packet: Packet) -> MuxResult<()> {
        if self.out.is_none() {
            return Err(MuxError::OutputNotSet);
        }

        // Normalize the timecodes according to the timecode scale.
        let scale = self.cfg.timecode_scale;
        packet.unmodified_assigned_timecode = packet.assigned_timecode;
        packet.unmodified_duration = packet.duration;
        packet.timecode = round_to_scale(packet.timecode, scale);
        if packet.duration > 0 {
            packet.duration = round_to_scale(packet.duration, scale);
        }
        packet.assigned_timecode = round_to_scale(packet.assigned_timecode, scale);
        if packet.bref > 0 {
            packet.bref = round_to_scale(packet.bref, scale);
        }
        if packet.fref > 0 {
            packet.fref = round_to_scale(packet.fref, scale);
        }

        let cluster_start_tc = self.cluster_start_timecode();

        // Span the active cluster would cover with this packet included,
        // in ticks; it must fit the signed 16-bit block timecode field.
        let hi = if self.max_timecode_in_cluster == -1
            || packet.assigned_timecode > self.max_timecode_in_cluster
        {
            packet.assigned_timecode
        } else {
            self.max_timecode_in_cluster
        };
        let lo = if self.min_timecode_in_cluster == -1
            || packet.assigned_timecode < self.min_timecode_in_cluster
        {
            packet.assigned_timecode
        } else {
            self.min_timecode_in_cluster
        };
        let timecode_delay = (hi - lo) / scale as i64;

        trace!(
            source = packet.source.id(),
            timecode = packet.timecode,
            duration = packet.duration,
            bref = packet.bref,
            fref = packet.fref,
            assigned_timecode = packet.assigned_timecode,
            timecode_delay,
            "new packet"
        );

        match self.clusters.last() {
            None => self.add_cluster()?,
            Some(active) => {
                let prev_gap = active.packets.last().is_some_and(|p| p.gap_following);
                let boundary = timecode_delay > i64::from(i16::MAX)
                    || timecode_delay < i64::from(i16::MIN)
                    || prev_gap
                    || (packet.assigned_timecode - cluster_start_tc > self.cfg.max_ns_per_cluster
                        && self.all_references_resolved(active));
                if boundary {
                    self.render()?;
                    self.add_cluster()?;
                }
            }
        }

        self.maybe_split(&packet)?;

        packet.packet_num = self.packet_num;
        self.packet_num += 1;

        let data_len = packet.data_len() as i64;
        let assigned_tc = packet.assigned_timecode;
        let active = self
            .clusters
            .last_mut()
            .expect("an active cluster exists after boundary handling");
        active.packets.push(packet);
        self.cluster_content_size += data_len;

        if assigned_tc > self.max_timecode_in_cluster {
            self.max_timecode_in_cluster = assigned_tc;
        }
        if self.min_timecode_in_cluster == -1 || assigned_tc < self.min_timecode_in_cluster {
            self.min_timecode_in_cluster = assigned_tc;
        }

        // Render the cluster if it is full (by span, block count or size).
        let cluster_start_tc = self.cluster_start_timecode();
        let full = assigned_tc - cluster_start_tc > self.cfg.max_ns_per_cluster
            || self.active_packet_count() > self.cfg.max_blocks_per_cluster as usize
            || self.cluster_content_size > MAX_CLUSTER_CONTENT_SIZE;
        if full {
            let resolved = self
                .clusters
                .last()
                .map(|c| self.all_references_resolved(c))
                .unwrap_or(false);
            if resolved {
                self.render()?;
                self.add_cluster()?;
            }
        }

        Ok(())
    }

    /// Rule B: rotate the output file when the active split point fires.
    /// Only key packets of the video track (or of any track when no video
    /// exists) are eligible boundaries.
    fn maybe_split(&mut self, packet: &Packet) -> MuxResult<()> {
        if !self.splitting() || self.current_split_point >= self.split_points.len() {
            return Ok(());
        }
        let file_num = self.out.as_deref().map_or(1, |o| o.file_num());
        if file_num > self.cfg.split_max_num_files
            || packet.bref != -1
            || (packet.source.track_type() != TrackType::Video && self.video_track_present)
        {
            return Ok(());
        }

        let split_point = self.split_points[self.current_split_point];
        let split = match split_point.kind {
            SplitKind::Size => {
                // Estimate what the active cluster would add to the file:
                // a cluster header allowance plus every frame with its
                // block framing overhead.
                let mut additional_size: i64 = 0;
                if let Some(active) = self.clusters.last() {
                    if !active.packets.is_empty() {
                        additional_size = 21;
                        for p in &active.packets {
                            additional_size += p.data_len() as i64;
                            additional_size += if p.bref == -1 {
                                10
                            } else if p.fref == -1 {
                                13
                            } else {
                                16
                            };
                        }
                    }
                }
                if self.num_cue_elements > 0 {
                    self.cues.update_size();
                    additional_size += self.cues.element_size() as i64;
                }
                debug!(
                    header_overhead = self.header_overhead,
                    additional_size,
                    bytes_in_file = self.bytes_in_file,
                    sum = self.header_overhead + additional_size + self.bytes_in_file,
                    "split decision"
                );
                self.header_overhead + additional_size + self.bytes_in_file >= split_point.point
            }
            SplitKind::Duration => {
                self.first_timecode_in_file >= 0
                    && packet.assigned_timecode - self.first_timecode_in_file >= split_point.point
            }
            SplitKind::Timecode => packet.assigned_timecode >= split_point.point,
        };

        if !split {
            return Ok(());
        }

        debug!(
            kind = ?split_point.kind,
            point = split_point.point,
            assigned_timecode = packet.assigned_timecode,
            "starting a new output file"
        );

        self.render()?;
        self.num_cue_elements = 0;

        {
            let out = self.out.as_mut().ok_or(MuxError::OutputNotSet)?;
            out.finish_file().map_err(MuxError::Output)?;
            out.create_next_file().map_err(MuxError::Output)?;
        }
        self.cues.reset();

        if self.cfg.no_linking {
            self.last_cluster_tc = 0;
        }
        self.add_cluster()?;

        self.bytes_in_file = 0;
        self.first_timecode_in_file = -1;

        if self.cfg.no_linking {
            self.timecode_offset = packet.assigned_timecode;
        }

        if split_point.use_once {
            self.current_split_point += 1;
        }

        Ok(())
    }

    /// Open a fresh active cluster, linked to the previous one's timecode.
    fn add_cluster(&mut self) -> MuxResult<()> {
        let out = self.out.as_mut().ok_or(MuxError::OutputNotSet)?;
        let mut element = out.new_cluster();
        element.set_previous_timecode(self.last_cluster_tc, self.cfg.timecode_scale as i64);
        self.clusters.push(ClusterContents::new(element));
        self.cluster_content_size = 0;
        Ok(())
    }

    /// `assigned_timecode` of the first packet of the active cluster, or 0
    /// when there is none.
    fn cluster_start_timecode(&self) -> i64 {
        self.clusters
            .last()
            .and_then(|c| c.packets.first())
            .map_or(0, |p| p.assigned_timecode)
    }

    fn active_packet_count(&self) -> usize {
        self.clusters.last().map_or(0, |c| c.packets.len())
    }

    /// Every reference in `cluster` resolves to a retained packet.
    fn all_references_resolved(&self, cluster: &ClusterContents) -> bool {
        cluster.packets.iter().all(|p| {
            (p.bref == -1 || self.find_packet(p.bref, &p.source).is_some())
                && (p.fref == -1 || self.find_packet(p.fref, &p.source).is_some())
        })
    }

    fn reference_tolerance(source: &SourceRef) -> i64 {
        match source.reference_timecode_tolerance() {
            0 => DEFAULT_REFERENCE_TOLERANCE,
            t => t,
        }
    }

    /// Retained packet of `source` whose timecode matches `ref_timecode`
    /// within the source's tolerance.
    fn find_packet(&self, ref_timecode: i64, source: &SourceRef) -> Option<&Packet> {
        let tolerance = Self::reference_tolerance(source);
        self.clusters.iter().flat_map(|c| c.packets.iter()).find(|p| {
            Rc::ptr_eq(&p.source, source) && (p.timecode - ref_timecode).abs() <= tolerance
        })
    }

    /// Index of the retained cluster holding the packet `ref_timecode`
    /// resolves to.
    fn find_packet_cluster(&self, ref_timecode: i64, source: &SourceRef) -> Option<usize> {
        let tolerance = Self::reference_tolerance(source);
        self.clusters.iter().position(|c| {
            c.packets.iter().any(|p| {
                Rc::ptr_eq(&p.source, source) && (p.timecode - ref_timecode).abs() <= tolerance
            })
        })
    }

    /// Force the active cluster out. Returns the number of clusters
    /// rendered (0 when there is nothing to do).
    pub fn render(&mut self) -> MuxResult<u32> {
        if self.clusters.is_empty() {
            return Ok(0);
        }
        self.render_cluster(self.clusters.len() - 1)
    }

    /// Render one cluster: walk its packets in ingestion order, drive the
    /// per-source render groups, emit cues, serialize, then release the
    /// payloads and prune unreferenced clusters.
    fn render_cluster(&mut self, idx: usize) -> MuxResult<u32> {
        assert!(!self.clusters[idx].rendered, "cluster rendered twice");

        if self.header_overhead == -1 && self.splitting() {
            let out = self.out.as_mut().ok_or(MuxError::OutputNotSet)?;
            self.header_overhead = out.position() as i64 + out.tags_size();
        }

        let std_blob_type = if self.cfg.use_simpleblock {
            BlockBlobType::AlwaysSimple
        } else {
            BlockBlobType::NoSimple
        };
        let lacing = self.cfg.lacing;

        let mut render_groups: Vec<RenderGroup> = Vec::new();
        let mut max_cl_timecode = 0;
        let mut elements_in_cluster = 0u32;
        let mut added_to_cues = false;

        let packet_count = self.clusters[idx].packets.len();
        for i in 0..packet_count {
            let this = &mut *self;
            let ClusterContents {
                element, packets, ..
            } = &mut this.clusters[idx];
            let pack = &mut packets[i];
            let source = Rc::clone(&pack.source);
            let has_codec_state = pack.codec_state.is_some();

            if source.contains_gap() {
                element.set_silent_track_used();
            }

            let rg_idx = render_groups
                .iter()
                .position(|rg| Rc::ptr_eq(&rg.source, &source))
                .unwrap_or_else(|| {
                    render_groups.push(RenderGroup::new(Rc::clone(&source)));
                    render_groups.len() - 1
                });

            if i == 0 {
                element.set_min_timecode(pack.assigned_timecode - this.timecode_offset);
            }
            max_cl_timecode = pack.assigned_timecode;

            let track_entry = source.track_entry();

            // A reference or a codec-state change always starts a new
            // block; lacing never continues across either.
            if pack.bref != -1 || has_codec_state {
                render_groups[rg_idx].more_data = false;
            }

            let blob_id = if !render_groups[rg_idx].more_data {
                set_duration(&this.cfg, &render_groups[rg_idx], element.as_mut());
                render_groups[rg_idx].durations.clear();
                render_groups[rg_idx].duration_mandatory = false;

                let mut blob_type = if !this.cfg.use_simpleblock {
                    std_blob_type
                } else if must_duration_be_set(&this.cfg, &render_groups[rg_idx], pack) {
                    BlockBlobType::NoSimple
                } else {
                    BlockBlobType::AlwaysSimple
                };
                if has_codec_state {
                    blob_type = BlockBlobType::NoSimple;
                }

                let id = element.add_blob(blob_type);
                render_groups[rg_idx].blobs.push(id);
                added_to_cues = false;
                id
            } else {
                *render_groups[rg_idx]
                    .blobs
                    .last()
                    .expect("a laced continuation always has a block")
            };

            let data = pack
                .data
                .clone()
                .expect("packet payloads are retained until their cluster renders");
            let more_data = element.blob_mut(blob_id).add_frame_auto(
                &track_entry,
                pack.assigned_timecode - this.timecode_offset,
                data,
                lacing,
                pack.bref - this.timecode_offset,
                pack.fref - this.timecode_offset,
            );
            render_groups[rg_idx].more_data = more_data;

            // A packet without references frees everything of its source
            // up to its own timecode.
            if pack.bref == -1 && pack.fref == -1 {
                source.set_free_refs(pack.timecode);
            }

            if let Some(state) = pack.codec_state.clone() {
                element.blob_mut(blob_id).push_codec_state(state);
            }

            if this.first_timecode_in_file == -1 {
                this.first_timecode_in_file = pack.assigned_timecode;
            }

            if pack.assigned_timecode + pack.duration > this.max_timecode_and_duration {
                this.max_timecode_and_duration = pack.assigned_timecode + pack.duration;
            }

            if pack.bref != -1 || pack.fref != -1 || !track_entry.lacing_enabled {
                render_groups[rg_idx].more_data = false;
            }

            render_groups[rg_idx].durations.push(pack.unmodified_duration);
            render_groups[rg_idx].duration_mandatory |= pack.duration_mandatory;

            if pack.ref_priority > 0 && element.blob_mut(blob_id).replace_simple_by_group() {
                element
                    .blob_mut(blob_id)
                    .push_reference_priority(u64::from(pack.ref_priority));
            }

            if !pack.data_adds.is_empty() && element.blob_mut(blob_id).replace_simple_by_group() {
                for (k, add) in pack.data_adds.iter().enumerate() {
                    element
                        .blob_mut(blob_id)
                        .push_block_addition(k as u64 + 1, add.clone());
                }
            }

            elements_in_cluster += 1;

            if this.cfg.write_cues && (!added_to_cues || has_codec_state) {
                let strategy = source.cue_strategy();
                let wanted = (strategy == CueStrategy::IFrames && pack.bref == -1)
                    || has_codec_state
                    || strategy == CueStrategy::All
                    || (strategy == CueStrategy::Sparse
                        && source.track_type() == TrackType::Audio
                        && !this.video_track_present
                        && (source.last_cue_timecode() < 0
                            || pack.assigned_timecode - source.last_cue_timecode()
                                >= SPARSE_CUE_INTERVAL));
                if wanted {
                    this.cues
                        .add_block_blob(blob_id, pack.assigned_timecode - this.timecode_offset);
                    this.num_cue_elements += 1;
                    source.set_last_cue_timecode(pack.assigned_timecode);
                    added_to_cues = true;
                }
            }

            pack.group = Some(blob_id);
        }

        if elements_in_cluster > 0 {
            let this = &mut *self;
            let cluster = &mut this.clusters[idx];
            for rg in &render_groups {
                set_duration(&this.cfg, rg, cluster.element.as_mut());
            }
            cluster
                .element
                .set_max_timecode(max_cl_timecode - this.timecode_offset);

            let out = this.out.as_mut().ok_or(MuxError::OutputNotSet)?;
            let position = out.position();
            cluster.element.render(&mut **out, this.cues.as_mut())?;
            this.bytes_in_file += cluster.element.element_size() as i64;

            let global_timecode = cluster.element.global_timecode();
            out.index_cluster(global_timecode, position);
            this.last_cluster_tc = global_timecode;
        } else {
            self.last_cluster_tc = 0;
        }

        for pack in &mut self.clusters[idx].packets {
            pack.data = None;
        }
        drop(render_groups);
        self.clusters[idx].rendered = true;

        self.free_clusters()?;

        self.min_timecode_in_cluster = -1;
        self.max_timecode_in_cluster = -1;

        Ok(1)
    }

    /// Reference GC: mark packets whose source has freed them, mark the
    /// clusters still reachable through live packets and their
    /// back-references, then drop every rendered cluster nothing reaches.
    fn free_clusters(&mut self) -> MuxResult<()> {
        if self.clusters.is_empty() {
            return Ok(());
        }

        // Part 1: packets released by their source are superseeded.
        for cluster in &mut self.clusters {
            for p in &mut cluster.packets {
                if p.source.free_refs() > p.timecode {
                    p.superseeded = true;
                }
            }
        }

        // Part 2: a live packet keeps its own cluster and the cluster of
        // its back-reference.
        let mut referenced = vec![false; self.clusters.len()];
        for (i, cluster) in self.clusters.iter().enumerate() {
            for p in &cluster.packets {
                if p.superseeded {
                    continue;
                }
                referenced[i] = true;
                if p.bref == -1 {
                    continue;
                }
                match self.find_packet_cluster(p.bref, &p.source) {
                    Some(k) => referenced[k] = true,
                    None => {
                        return Err(MuxError::UnresolvedReference {
                            timecode: p.timecode,
                            ref_timecode: p.bref,
                            source_id: p.source.id(),
                        })
                    }
                }
            }
        }
        for (cluster, marked) in self.clusters.iter_mut().zip(&referenced) {
            cluster.is_referenced = *marked;
        }

        // Part 3: drop rendered clusters nothing references anymore.
        let before = self.clusters.len();
        self.clusters.retain(|c| !c.rendered || c.is_referenced);
        if before != self.clusters.len() {
            trace!(
                freed = before - self.clusters.len(),
                retained = self.clusters.len(),
                "pruned clusters"
            );
        }

        // Part 4: never leave the helper without an active cluster.
        if self.clusters.is_empty() {
            self.add_cluster()?;
        }

        Ok(())
    }

    /// Validate that every live back-reference still resolves. Not part
    /// of the ingestion path; meant for debugging and tests.
    pub fn check_clusters(&self) -> MuxResult<()> {
        for cluster in &self.clusters {
            for p in &cluster.packets {
                if cluster.rendered && p.superseeded {
                    continue;
                }
                if p.bref == -1 {
                    continue;
                }
                if self.find_packet_cluster(p.bref, &p.source).is_none() {
                    return Err(MuxError::UnresolvedReference {
                        timecode: p.timecode,
                        ref_timecode: p.bref,
                        source_id: p.source.id(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Span between the first timecode of the current file and the end of
    /// its last frame.
    pub fn get_duration(&self) -> i64 {
        trace!(
            max_timecode_and_duration = self.max_timecode_and_duration,
            first_timecode_in_file = self.first_timecode_in_file,
            "duration query"
        );
        self.max_timecode_and_duration - self.first_timecode_in_file
    }

    /// The active cluster element, if any cluster is open.
    pub fn get_cluster(&self) -> Option<&dyn ClusterElement> {
        self.clusters.last().map(|c| &*c.element)
    }

    /// The `num`-th packet of the active cluster, when in range.
    pub fn get_packet(&self, num: usize) -> Option<&Packet> {
        self.clusters.last().and_then(|c| c.packets.get(num))
    }

    /// Number of packets in the active cluster; `None` when no cluster
    /// has been opened yet.
    pub fn get_packet_count(&self) -> Option<usize> {
        self.clusters.last().map(|c| c.packets.len())
    }

    /// Number of clusters currently retained: the active one plus any
    /// rendered clusters kept alive by reference resolution.
    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Rendered cluster bytes written to the current file so far.
    pub fn bytes_in_file(&self) -> i64 {
        self.bytes_in_file
    }

    /// `assigned_timecode` of the first packet rendered into the current
    /// file, -1 before the first render.
    pub fn first_timecode_in_file(&self) -> i64 {
        self.first_timecode_in_file
    }

    /// Timecode subtracted from every block of the current file.
    pub fn timecode_offset(&self) -> i64 {
        self.timecode_offset
    }
}
