pub fn title_from_id(id: &str) -> &str {
    let name = id.rsplit('/').next().unwrap_or(id);
    name.strip_suffix(".md").unwrap_or(name)
}

pub fn golden_direction(seed_a: usize, seed_b: usize) -> (f32, f32) {
    let angle = ((seed_a as f32) * 0.618_034 + (seed_b as f32) * 0.414_214) * std::f32::consts::TAU;
    (angle.cos(), angle.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_strips_folders_and_markdown_extension() {
        assert_eq!(title_from_id("notes/daily/2024-01-01.md"), "2024-01-01");
        assert_eq!(title_from_id("Inbox"), "Inbox");
        assert_eq!(title_from_id("assets/diagram.png"), "diagram.png");
    }
}
