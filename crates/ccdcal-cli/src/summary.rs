use ccdcal_core::cosmic::{CosmicRayReview, LabelConfig};
use ccdcal_core::mask::{HotPixelClassification, HotPixelConfig};
use ccdcal_core::pipeline::config::PipelineConfig;
use ccdcal_core::pipeline::CombinedDark;
use console::Style;

/// Events listed individually before the table is truncated.
const MAX_LISTED_EVENTS: usize = 20;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

fn rule(len: usize) -> String {
    "\u{2550}".repeat(len)
}

pub fn print_pipeline_summary(config: &PipelineConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("CCD Calibration Pipeline"));
    println!("  {}", s.title.apply_to(rule(24)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Raw darks"),
        s.path.apply_to(config.darks.input_dir.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.darks.output_dir.display())
    );
    println!();

    let combine = &config.darks.combine;
    println!("  {}", s.header.apply_to("Dark Combination"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Method"),
        s.method.apply_to(combine.method)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Clip"),
        s.value.apply_to(format!(
            "-{} / +{} x {} about {}",
            combine.clip_low, combine.clip_high, combine.clip_deviation, combine.clip_center
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Mem limit"),
        s.value
            .apply_to(format!("{:.0} MB", combine.memory_limit_bytes as f64 / 1e6))
    );
    println!();

    if let Some(ref hot) = config.hot_pixels {
        println!("  {}", s.header.apply_to("Hot Pixels"));
        println!(
            "    {:<12}{}",
            s.label.apply_to("Short"),
            s.value.apply_to(
                hot.short_exposure
                    .map(|t| format!("{t} s"))
                    .unwrap_or_else(|| "shortest".into())
            )
        );
        println!(
            "    {:<12}{}",
            s.label.apply_to("Long"),
            s.value.apply_to(
                hot.long_exposure
                    .map(|t| format!("{t} s"))
                    .unwrap_or_else(|| "longest".into())
            )
        );
        print_thresholds(&s, &hot.thresholds);
        println!();
    } else {
        println!(
            "  {:<14}{}",
            s.header.apply_to("Hot Pixels"),
            s.disabled.apply_to("disabled")
        );
        println!();
    }

    if config.masks.extra.is_empty() {
        println!(
            "  {:<14}{}",
            s.header.apply_to("Extra Masks"),
            s.disabled.apply_to("none")
        );
    } else {
        println!("  {}", s.header.apply_to("Extra Masks"));
        for (i, path) in config.masks.extra.iter().enumerate() {
            println!(
                "    {}. {}",
                s.label.apply_to(i + 1),
                s.path.apply_to(path.display())
            );
        }
    }
    println!();

    if let Some(ref cr) = config.cosmic_rays {
        println!("  {}", s.header.apply_to("Cosmic Rays"));
        println!(
            "    {:<12}{}",
            s.label.apply_to("Science"),
            s.path.apply_to(cr.science.display())
        );
        println!(
            "    {:<12}{}",
            s.label.apply_to("Detector"),
            s.method.apply_to(format!(
                "L.A.Cosmic sigclip={} sigfrac={} objlim={}",
                cr.lacosmic.sigma_clip, cr.lacosmic.sigma_frac, cr.lacosmic.obj_lim
            ))
        );
        println!(
            "    {:<12}{}",
            s.label.apply_to("Grouping"),
            s.value.apply_to(format!(
                "{}, >= {} px",
                cr.label.connectivity, cr.label.min_pixels
            ))
        );
    } else {
        println!(
            "  {:<14}{}",
            s.header.apply_to("Cosmic Rays"),
            s.disabled.apply_to("disabled")
        );
    }
    println!();
}

pub fn print_combined_darks(darks: &[CombinedDark]) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Combined Darks"));
    for dark in darks {
        println!(
            "    {:>10}  {}  {}",
            s.value.apply_to(format!("{} s", dark.exposure_time)),
            s.label.apply_to(format!("{:>3} frames", dark.source_count)),
            s.path.apply_to(dark.path.display())
        );
    }
    println!();
}

pub fn print_hot_pixels(config: &HotPixelConfig, result: &HotPixelClassification) {
    let s = Styles::new();

    println!("  {}", s.header.apply_to("Hot Pixels"));
    print_thresholds(&s, config);
    println!(
        "    {:<12}{}",
        s.label.apply_to("Candidates"),
        s.value.apply_to(result.candidates.count())
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Bad"),
        s.value.apply_to(result.hot.count())
    );
    println!();
}

fn print_thresholds(s: &Styles, config: &HotPixelConfig) {
    println!(
        "    {:<12}{}",
        s.label.apply_to("Long gate"),
        s.value.apply_to(format!("{} e-/s", config.long_threshold))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Short gate"),
        s.value.apply_to(format!("{} e-/s", config.short_threshold))
    );
}

pub fn print_cosmic_rays(config: &LabelConfig, review: &CosmicRayReview) {
    let s = Styles::new();

    println!("  {}", s.header.apply_to("Cosmic Ray Events"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Flagged"),
        s.value.apply_to(format!("{} px", review.mask.count()))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Events"),
        s.value.apply_to(format!(
            "{} ({}, >= {} px)",
            review.events.len(),
            config.connectivity,
            config.min_pixels
        ))
    );

    if !review.events.is_empty() {
        println!();
        println!(
            "    {:>6}  {:>6}  {:>9}  {:>9}",
            s.label.apply_to("label"),
            s.label.apply_to("area"),
            s.label.apply_to("row"),
            s.label.apply_to("col")
        );
        for event in review.events.iter().take(MAX_LISTED_EVENTS) {
            let (row, col) = event.centroid();
            println!(
                "    {:>6}  {:>6}  {:>9.1}  {:>9.1}",
                event.label, event.area, row, col
            );
        }
        if review.events.len() > MAX_LISTED_EVENTS {
            println!(
                "    {}",
                s.disabled.apply_to(format!(
                    "... {} more",
                    review.events.len() - MAX_LISTED_EVENTS
                ))
            );
        }
    }
    println!();
}
