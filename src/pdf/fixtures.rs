//! Synthetic PDFs for unit tests

use lopdf::{dictionary, Document, Object, ObjectId, Stream};

#[derive(Debug, Clone, Copy)]
pub struct PageSpec {
    pub width: i64,
    pub height: i64,
}

impl PageSpec {
    pub fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }

    pub fn letter_pages(count: usize) -> Vec<Self> {
        vec![Self::new(612, 792); count]
    }
}

fn rect(x0: i64, y0: i64, x1: i64, y1: i64) -> Object {
    Object::Array(vec![
        Object::Integer(x0),
        Object::Integer(y0),
        Object::Integer(x1),
        Object::Integer(y1),
    ])
}

fn text_content(label: &str) -> Vec<u8> {
    format!("BT /F1 24 Tf 72 72 Td ({}) Tj ET", label).into_bytes()
}

fn finish(mut doc: Document, pages_id: ObjectId, extra_catalog: Option<(&str, Object)>) -> Vec<u8> {
    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    };
    if let Some((key, value)) = extra_catalog {
        catalog.set(key, value);
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// One page per spec, each showing the text "Page N"
pub fn build_pdf(specs: &[PageSpec]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for (index, spec) in specs.iter().enumerate() {
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            text_content(&format!("Page {}", index + 1)),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => rect(0, 0, spec.width, spec.height),
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    finish(doc, pages_id, None)
}

/// Pages without their own MediaBox, inheriting `size` from the page tree root
pub fn build_inherited_box_pdf(count: usize, size: (i64, i64)) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for index in 0..count {
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            text_content(&format!("Page {}", index + 1)),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(content_id),
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count as i64,
            "MediaBox" => rect(0, 0, size.0, size.1),
            "Resources" => dictionary! {},
        }),
    );

    finish(doc, pages_id, None)
}

/// A text field widget for `build_widget_pdf`
#[derive(Debug, Clone, Copy)]
pub struct WidgetSpec {
    pub value: &'static str,
    pub rect: [i64; 4],
    /// Appearance BBox and optional /Matrix; `None` leaves the widget without /AP
    pub appearance: Option<([i64; 4], Option<[i64; 6]>)>,
}

impl WidgetSpec {
    pub fn drawn(value: &'static str, rect: [i64; 4]) -> Self {
        let bbox = [0, 0, rect[2] - rect[0], rect[3] - rect[1]];
        Self {
            value,
            rect,
            appearance: Some((bbox, None)),
        }
    }

    pub fn without_appearance(value: &'static str, rect: [i64; 4]) -> Self {
        Self {
            value,
            rect,
            appearance: None,
        }
    }
}

/// A single page with one filled text field whose appearance draws "Filled"
pub fn build_form_pdf() -> Vec<u8> {
    build_widget_pdf(&[WidgetSpec::drawn("Filled", [100, 600, 300, 620])], false)
}

/// A single letter page carrying `widgets` and a trailing link annotation
///
/// Appearance streams have no /Resources of their own and rely on the
/// AcroForm's /DR for the Helv font.
pub fn build_widget_pdf(widgets: &[WidgetSpec], need_appearances: bool) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut annots = Vec::new();
    for (index, widget) in widgets.iter().enumerate() {
        let [x0, y0, x1, y1] = widget.rect;
        let mut field = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => Object::string_literal(format!("field{}", index)),
            "V" => Object::string_literal(widget.value),
            "DA" => Object::string_literal("/Helv 12 Tf 0 g"),
            "Rect" => rect(x0, y0, x1, y1),
            "P" => Object::Reference(page_id),
        };

        if let Some(([b0, b1, b2, b3], matrix)) = widget.appearance {
            let mut stream_dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => rect(b0, b1, b2, b3),
            };
            if let Some(matrix) = matrix {
                stream_dict.set(
                    "Matrix",
                    Object::Array(matrix.iter().map(|&v| Object::Integer(v)).collect()),
                );
            }
            let content = format!("BT /Helv 12 Tf 2 5 Td ({}) Tj ET", widget.value);
            let appearance_id = doc.add_object(Stream::new(stream_dict, content.into_bytes()));
            field.set("AP", dictionary! { "N" => Object::Reference(appearance_id) });
        }

        annots.push(Object::Reference(doc.add_object(field)));
    }
    let fields = annots.clone();

    annots.push(Object::Reference(doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "Rect" => rect(0, 0, 10, 10),
    })));

    let content_id = doc.add_object(Stream::new(dictionary! {}, text_content("Form page")));
    doc.objects.insert(
        page_id,
        Object::Dictionary(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => rect(0, 0, 612, 792),
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {},
            "Annots" => annots,
        }),
    );

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
        }),
    );

    let mut acro_form = dictionary! {
        "Fields" => fields,
        "DA" => Object::string_literal("/Helv 12 Tf 0 g"),
        "DR" => dictionary! {
            "Font" => dictionary! { "Helv" => Object::Reference(font_id) },
        },
    };
    if need_appearances {
        acro_form.set("NeedAppearances", Object::Boolean(true));
    }
    finish(doc, pages_id, Some(("AcroForm", Object::Dictionary(acro_form))))
}

/// Two pages whose annotations point across the page boundary
///
/// Page 1 holds a link to page 2, a GoTo action to page 2, a note whose
/// /P names page 2, and one widget of a field that also has a widget on
/// page 2.
pub fn build_cross_linked_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let first_id = doc.new_object_id();
    let second_id = doc.new_object_id();
    let field_id = doc.new_object_id();

    let link_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "Rect" => rect(0, 0, 10, 10),
        "Dest" => vec![Object::Reference(second_id), Object::Name(b"Fit".to_vec())],
    });
    let action_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "Rect" => rect(20, 0, 30, 10),
        "A" => dictionary! {
            "S" => "GoTo",
            "D" => vec![Object::Reference(second_id), Object::Name(b"Fit".to_vec())],
        },
    });
    let note_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Text",
        "Rect" => rect(40, 0, 50, 10),
        "Contents" => Object::string_literal("note"),
        "P" => Object::Reference(second_id),
    });
    let first_widget_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "Rect" => rect(100, 600, 300, 620),
        "Parent" => Object::Reference(field_id),
        "P" => Object::Reference(first_id),
    });
    let second_widget_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "Rect" => rect(100, 600, 300, 620),
        "Parent" => Object::Reference(field_id),
        "P" => Object::Reference(second_id),
    });
    doc.objects.insert(
        field_id,
        Object::Dictionary(dictionary! {
            "FT" => "Tx",
            "T" => Object::string_literal("shared"),
            "V" => Object::string_literal("Shared value"),
            "Kids" => vec![
                Object::Reference(first_widget_id),
                Object::Reference(second_widget_id),
            ],
        }),
    );

    let pages = [
        (first_id, vec![link_id, action_id, note_id, first_widget_id]),
        (second_id, vec![second_widget_id]),
    ];
    for (index, (page_id, annots)) in pages.into_iter().enumerate() {
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            text_content(&format!("Page {}", index + 1)),
        ));
        doc.objects.insert(
            page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => rect(0, 0, 612, 792),
                "Contents" => Object::Reference(content_id),
                "Resources" => dictionary! {},
                "Annots" => annots.into_iter().map(Object::Reference).collect::<Vec<_>>(),
            }),
        );
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(first_id), Object::Reference(second_id)],
            "Count" => Object::Integer(2),
        }),
    );

    let acro_form = Object::Dictionary(dictionary! {
        "Fields" => vec![Object::Reference(field_id)],
    });
    finish(doc, pages_id, Some(("AcroForm", acro_form)))
}
