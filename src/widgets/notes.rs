/// A single note buffer; every save replaces the previous text.
#[derive(Debug, Clone, Default)]
pub struct Notes {
    text: String,
}

impl Notes {
    pub fn save(&mut self, text: &str) -> &str {
        self.text = text.to_string();
        &self.text
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
