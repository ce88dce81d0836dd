pub mod components;
pub mod lacosmic;
pub mod post_filter;

pub use components::{connected_components, detect_sources, Component, Connectivity};
pub use lacosmic::{detect_cosmic_rays, LaCosmicParams};
pub use post_filter::{
    cosmic_ray_only, group_events, post_filter, post_filter_frame, CosmicRayEvent,
    CosmicRayReview, LabelConfig,
};
