use console::Style;
use driftstack_core::pipeline::config::PipelineConfig;
use driftstack_core::pipeline::AlignmentReport;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
    good: Style,
    bad: Style,
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
            good: Style::new().green(),
            bad: Style::new().red(),
        }
    }
}

fn or_auto(value: Option<usize>) -> String {
    value.map_or_else(|| "auto".to_string(), |v| format!("{v} px"))
}

pub fn print_align_summary(config: &PipelineConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Driftstack Alignment"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(20)));
    println!();

    if let Some(reference) = config.inputs.first() {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Reference"),
            s.path.apply_to(reference.display())
        );
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("Frames"),
        s.value.apply_to(config.inputs.len())
    );
    if config.out_of_core {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Storage"),
            s.method.apply_to("memory-mapped")
        );
    }
    println!();

    println!("  {}", s.header.apply_to("Alignment"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Method"),
        s.method.apply_to(&config.align.method)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Radius"),
        s.value.apply_to(or_auto(config.radius))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Search"),
        s.value.apply_to(or_auto(config.search_radius))
    );
    match config.center {
        Some((x, y)) => println!(
            "    {:<12}{}",
            s.label.apply_to("Center"),
            s.value.apply_to(format!("({x}, {y})"))
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("Center"),
            s.method.apply_to("auto anchor")
        ),
    }
    if config.median_radius > 0 {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Median"),
            s.value.apply_to(format!("radius {}", config.median_radius))
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Median"),
            s.disabled.apply_to("disabled")
        );
    }
    if config.align.subpixel_step > 0.0 {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Subpixel"),
            s.value.apply_to(format!("step {}", config.align.subpixel_step))
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Subpixel"),
            s.disabled.apply_to("disabled")
        );
    }
    println!();

    println!("  {}", s.header.apply_to("Output"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Threshold"),
        s.value.apply_to(config.output.error_threshold)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Prefix"),
        s.value.apply_to(&config.output.prefix)
    );
    if config.output.save_bad {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Bad prefix"),
            s.value.apply_to(&config.output.prefix_bad)
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Bad frames"),
            s.disabled.apply_to("skipped")
        );
    }
    if let Some(ref stack) = config.output.stack {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Stack"),
            s.path.apply_to(stack.display())
        );
    }
    if config.output.sort {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Sort"),
            s.value.apply_to("by error")
        );
    }
    if config.output.debug {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Debug"),
            s.method.apply_to("check window and residuals")
        );
    }
    println!();
}

pub fn print_report(report: &AlignmentReport) {
    let s = Styles::new();

    println!("  {}", s.header.apply_to("Results"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Center"),
        s.value.apply_to(format!("({}, {})", report.center.0, report.center.1))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Radius"),
        s.value
            .apply_to(format!("{} px, search {} px", report.radius, report.search_radius))
    );
    println!();

    for frame in &report.frames {
        let name = frame
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (dx, dy) = frame.alignment.offset();
        let status = if frame.good {
            s.good.apply_to("good")
        } else if frame.output.is_some() {
            s.bad.apply_to("bad")
        } else {
            s.bad.apply_to("skipped")
        };
        println!(
            "    {:<28} {:>8.2} {:>8.2}  {:<10.6} {}",
            name, dx, dy, frame.alignment.error, status
        );
    }
    println!();
    println!(
        "  {} good, {} bad",
        s.good.apply_to(report.good_count()),
        s.bad.apply_to(report.bad_count())
    );
    if let Some(ref stack) = report.stack {
        println!("  Stack saved to {}", s.path.apply_to(stack.display()));
    }
}
