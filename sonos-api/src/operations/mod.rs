//! Operation definitions, grouped by service

pub mod av_transport;
pub mod rendering_control;
pub mod zone_group_topology;
