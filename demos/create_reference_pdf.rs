use memo_fill::Field;
use printpdf::{BuiltinFont, Mm, PdfDocument};
use serde_json::json;
use std::io::BufWriter;
use std::path::PathBuf;

const PAGE_WIDTH_MM: f64 = 210.0;
const PAGE_HEIGHT_MM: f64 = 297.0;
const PT_TO_MM: f64 = 25.4 / 72.0;

/// (field, x, top, width, height) in mm from the top-left corner, font size in pt, bold
const LAYOUT: [(Field, f64, f64, f64, f64, f64, bool); 10] = [
    (Field::MainTitle, 20.0, 20.0, 170.0, 14.0, 32.0, true),
    (Field::Headline, 20.0, 38.0, 170.0, 10.0, 20.0, false),
    (Field::CompanyName, 20.0, 52.0, 170.0, 8.0, 14.0, false),
    (Field::ProjectName, 20.0, 120.0, 170.0, 12.0, 24.0, true),
    (Field::LoanAmount, 20.0, 136.0, 90.0, 10.0, 18.0, true),
    (Field::ReferenceNumber, 20.0, 250.0, 110.0, 6.0, 10.0, false),
    (Field::DateText, 140.0, 250.0, 50.0, 6.0, 10.0, false),
    (Field::WebsiteLine, 20.0, 262.0, 80.0, 6.0, 10.0, false),
    (Field::FooterLine1, 20.0, 276.0, 170.0, 5.0, 8.0, false),
    (Field::FooterLine2, 20.0, 282.0, 170.0, 5.0, 8.0, false),
];

/// Text printed on the reference page, matching what an overlay fill draws
fn default_text(field: Field) -> String {
    match field {
        Field::ReferenceNumber => format!("Our Reference Number: {}", field.default_value()),
        Field::DateText => format!("Date: {}", field.default_value()),
        _ => field.default_value().to_string(),
    }
}

fn main() {
    let target_dir = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

    let (doc, page1, layer1) =
        PdfDocument::new("Finance Memorandum Template", Mm(PAGE_WIDTH_MM as f32), Mm(PAGE_HEIGHT_MM as f32), "Layer 1");
    let current_layer = doc.get_page(page1).get_layer(layer1);

    // Add built-in fonts to the document
    let font_bold_ref = doc.add_builtin_font(BuiltinFont::HelveticaBold).unwrap();
    let font_ref = doc.add_builtin_font(BuiltinFont::Helvetica).unwrap();

    let mut fields = serde_json::Map::new();
    for (field, x, top, w, h, size, bold) in LAYOUT {
        // Baseline sits so capitals are centred in the box, as the filler draws them
        let cap_height = size * 0.7 * PT_TO_MM;
        let baseline = PAGE_HEIGHT_MM - top - h + (h - cap_height) / 2.0;
        let font = if bold { &font_bold_ref } else { &font_ref };
        current_layer.use_text(default_text(field), size as f32, Mm(x as f32), Mm(baseline as f32), font);

        let mut entry = json!({
            "x": format!("{} mm", x),
            "y": format!("{} mm", top),
            "w": format!("{} mm", w),
            "h": format!("{} mm", h),
            "font_size": size,
        });
        if bold {
            entry["font"] = json!("Helvetica-Bold");
        }
        fields.insert(field.key().to_string(), entry);
    }

    let pdf_path = target_dir.join("reference.pdf");
    let file = std::fs::File::create(&pdf_path).unwrap();
    let mut writer = BufWriter::new(file);
    doc.save(&mut writer).unwrap();
    println!("Created {:?}", pdf_path);

    let config = json!({
        "kind": "overlay",
        "template": "reference.pdf",
        "fields": fields,
        "images": {
            "coverImage": { "x": "20 mm", "y": "150 mm", "w": "170 mm", "h": "90 mm" },
            "footerLogo": { "x": "160 mm", "y": "262 mm", "w": "30 mm", "h": "12 mm" }
        },
        "settings": { "font": "Helvetica", "min_font_size": 6, "shrink_step": 0.5, "padding": 2 }
    });
    let config_path = target_dir.join("template.json");
    std::fs::write(&config_path, serde_json::to_vec_pretty(&config).unwrap()).unwrap();
    println!("Created {:?}", config_path);
}
