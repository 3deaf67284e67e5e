//! OCR Assistant binary. All the work lives in the library crate.

fn main() {
    ocr_assistant_lib::run();
}
