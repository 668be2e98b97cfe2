//! Run a [`Bridge`] as a node inside a `dasp_graph` processor.
//!
//! dasp_graph processes fixed blocks of [`Buffer::LEN`] frames, so the node
//! negotiates that cycle length when it is created. Incoming edges are
//! flattened in order into playback channels; the node's own output buffers
//! carry the captured channels to whatever is connected downstream.

use dasp_graph::{Buffer, Input, Node, NodeData};

use crate::bridge::{Bridge, CycleReport};
use crate::device::PcmStream;
use crate::error::BridgeError;
use crate::ports::CyclePorts;

/// A bridge session wrapped as a graph node.
pub struct BridgeNode<S: PcmStream> {
    bridge: Bridge<S>,
    last: CycleReport,
}

impl<S: PcmStream> BridgeNode<S> {
    /// Wrap `bridge` and fix its cycle length to the graph block size.
    ///
    /// The sample rate still has to be negotiated through
    /// [`bridge_mut`](Self::bridge_mut) before the first block.
    pub fn new(mut bridge: Bridge<S>) -> Result<Self, BridgeError> {
        bridge.on_buffer_size(Buffer::LEN)?;
        Ok(Self {
            bridge,
            last: CycleReport::default(),
        })
    }

    /// Node data with one output buffer per capture channel.
    pub fn into_node_data(self) -> NodeData<Self> {
        // sinks still need a buffer
        let outputs = self.bridge.config().capture_channels.max(1);
        NodeData::new(self, vec![Buffer::default(); outputs])
    }

    pub fn bridge(&self) -> &Bridge<S> {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut Bridge<S> {
        &mut self.bridge
    }

    pub fn into_inner(self) -> Bridge<S> {
        self.bridge
    }

    /// Report of the most recent block.
    pub fn last_report(&self) -> CycleReport {
        self.last
    }
}

impl<S: PcmStream> Node for BridgeNode<S> {
    fn process(&mut self, inputs: &[Input], output: &mut [Buffer]) {
        for buffer in output.iter_mut() {
            buffer.iter_mut().for_each(|s| *s = 0.0);
        }
        let mut ports = GraphPorts { inputs, output };
        self.last = self.bridge.process(&mut ports, Buffer::LEN);
    }
}

struct GraphPorts<'a> {
    inputs: &'a [Input],
    output: &'a mut [Buffer],
}

impl CyclePorts for GraphPorts<'_> {
    fn playback(&self, channel: usize) -> Option<&[f32]> {
        self.inputs
            .iter()
            .flat_map(|input| input.buffers())
            .nth(channel)
            .map(|buffer| &buffer[..])
    }

    fn capture(&mut self, channel: usize) -> Option<&mut [f32]> {
        self.output.get_mut(channel).map(|buffer| &mut buffer[..])
    }
}
