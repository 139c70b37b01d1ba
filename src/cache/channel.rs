use serde::{Deserialize, Serialize};

use crate::constants::cache::{DIR_DATA, DIR_GUIDE, DIR_MESH, DIR_NOISE, DIR_PARTICLES};

/// Independently baked part of a domain cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Data,
    Noise,
    Mesh,
    Particles,
    Guide,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Data,
        Channel::Noise,
        Channel::Mesh,
        Channel::Particles,
        Channel::Guide,
    ];

    /// Subdirectory below the cache root
    pub fn dir_name(self) -> &'static str {
        match self {
            Channel::Data => DIR_DATA,
            Channel::Noise => DIR_NOISE,
            Channel::Mesh => DIR_MESH,
            Channel::Particles => DIR_PARTICLES,
            Channel::Guide => DIR_GUIDE,
        }
    }

    /// File name stem for frame files
    pub fn file_stem(self) -> &'static str {
        match self {
            Channel::Data => "fluid_data",
            Channel::Noise => "fluid_noise",
            Channel::Mesh => "fluid_mesh",
            Channel::Particles => "fluid_particles",
            Channel::Guide => "fluid_guide",
        }
    }

    fn slot(self) -> usize {
        match self {
            Channel::Data => 0,
            Channel::Noise => 1,
            Channel::Mesh => 2,
            Channel::Particles => 3,
            Channel::Guide => 4,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Bake status of one channel. `baking` and `baked` are never both set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelState {
    pub baking: bool,
    pub baked: bool,
    pub outdated: bool,
    /// Frame a paused bake stopped at, 0 when not paused
    pub pause_frame: i32,
}

impl ChannelState {
    pub fn begin(&mut self) {
        self.baking = true;
        self.baked = false;
        self.outdated = false;
    }

    pub fn pause(&mut self, frame: i32) {
        self.baking = false;
        self.pause_frame = frame;
    }

    pub fn finish(&mut self) {
        self.baking = false;
        self.baked = true;
        self.pause_frame = 0;
    }

    /// Settings changed under an existing bake
    pub fn mark_outdated(&mut self) {
        self.outdated = true;
        self.baking = false;
        self.baked = false;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelStates {
    states: [ChannelState; 5],
}

impl ChannelStates {
    pub fn get(&self, channel: Channel) -> &ChannelState {
        &self.states[channel.slot()]
    }

    pub fn get_mut(&mut self, channel: Channel) -> &mut ChannelState {
        &mut self.states[channel.slot()]
    }

    pub fn is_baking(&self, channel: Channel) -> bool {
        self.get(channel).baking
    }

    pub fn pause_frame(&self, channel: Channel) -> i32 {
        self.get(channel).pause_frame
    }

    pub fn any_outdated(&self) -> bool {
        self.states.iter().any(|s| s.outdated)
    }

    pub fn begin_bake(&mut self, channels: &[Channel]) {
        for &channel in channels {
            self.get_mut(channel).begin();
        }
    }

    pub fn pause_bake(&mut self, channel: Channel, frame: i32) {
        self.get_mut(channel).pause(frame);
    }

    pub fn finish_bake(&mut self, channel: Channel) {
        self.get_mut(channel).finish();
    }

    /// Channels with a bake in progress
    pub fn baking(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|&c| self.is_baking(c))
            .collect()
    }
}
