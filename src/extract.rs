//! Field extraction boundary.
//!
//! The content-level gate runs on every capture regardless of the session
//! outcome: a session can report `Exhausted` and still hand back a content
//! page, or report `Solved` while the site re-served the interstitial. Only
//! the marker check decides.

use chrono::Utc;
use scraper::{Html, Selector};
use tracing::debug;

use crate::core::types::CatalogRecord;
use crate::core::CrawlError;

/// Marker string the catalog site renders on its verification interstitial.
pub const DEFAULT_VERIFICATION_MARKER: &str = "访问行为验证";

/// Reject content that is still the verification page.
pub fn ensure_not_blocked(html: &str, marker: &str) -> Result<(), CrawlError> {
    if html.contains(marker) {
        return Err(CrawlError::CaptchaRecognition);
    }
    Ok(())
}

/// Pull a labeled value out of the detail page's attribute table: the cell
/// whose text contains `label`, value in the following cell's span.
fn labeled_cell(doc: &Html, label: &str) -> String {
    let row_sel = Selector::parse("tr").expect("static selector");
    let cell_sel = Selector::parse("td").expect("static selector");
    let span_sel = Selector::parse("span").expect("static selector");

    for row in doc.select(&row_sel) {
        let cells: Vec<_> = row.select(&cell_sel).collect();
        for pair in cells.windows(2) {
            let label_text: String = pair[0].text().collect();
            if !label_text.contains(label) {
                continue;
            }
            let value = pair[1]
                .select(&span_sel)
                .next()
                .map(|s| s.text().collect::<String>())
                .unwrap_or_else(|| pair[1].text().collect());
            return value.trim().to_string();
        }
    }
    String::new()
}

/// Detail images are served via relative `getPic` endpoints; resolve them
/// against the page URL and join so the record stays a flat row.
fn detail_image_urls(doc: &Html, source_url: &str) -> String {
    let img_sel = Selector::parse(r#"img[src^="getPic"]"#).expect("static selector");
    let base = url::Url::parse(source_url).ok();
    let urls: Vec<String> = doc
        .select(&img_sel)
        .filter_map(|img| img.value().attr("src"))
        .map(|src| {
            base.as_ref()
                .and_then(|b| b.join(src).ok())
                .map(|u| u.to_string())
                .unwrap_or_else(|| src.to_string())
        })
        .collect();
    urls.join(";")
}

/// Extract one catalog record from a solved detail page.
pub fn extract_record(html: &str, seq: u64, source_url: &str) -> CatalogRecord {
    let doc = Html::parse_document(html);

    let record = CatalogRecord {
        seq,
        source_url: source_url.to_string(),
        product_id: labeled_cell(&doc, "产品号"),
        batch: labeled_cell(&doc, "批次"),
        publish_date: labeled_cell(&doc, "发布日期"),
        company_name: labeled_cell(&doc, "企业名称"),
        product_trademark: labeled_cell(&doc, "产品商标"),
        production_address: labeled_cell(&doc, "生产地址"),
        vehicle_model: labeled_cell(&doc, "车辆型号"),
        vehicle_name: labeled_cell(&doc, "车辆名称"),
        chassis_id: labeled_cell(&doc, "底盘ID"),
        chassis_model_and_company: labeled_cell(&doc, "底盘型号及企业"),
        vin: labeled_cell(&doc, "车辆识别代号"),
        fuel_type: labeled_cell(&doc, "燃料种类"),
        fuel_consumption: labeled_cell(&doc, "油耗"),
        emission_standard: labeled_cell(&doc, "排放依据标准"),
        engine_manufacturer: labeled_cell(&doc, "发动机生产企业"),
        engine_model: labeled_cell(&doc, "发动机型号"),
        displacement: labeled_cell(&doc, "排量"),
        reflective_mark_company: labeled_cell(&doc, "反光标识企业"),
        other_info: labeled_cell(&doc, "其它"),
        production_end_date: labeled_cell(&doc, "停产日期"),
        sales_end_date: labeled_cell(&doc, "停售日期"),
        image_urls: detail_image_urls(&doc, source_url),
        fetched_at: Utc::now(),
    };
    debug!("Extracted record seq={} product_id={}", seq, record.product_id);
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL_PAGE: &str = r#"
        <html><body>
        <img src="getPic?id=1&side=front">
        <img src="getPic?id=1&side=rear">
        <img src="/static/logo.png">
        <table>
            <tr><td>产品号</td><td><span> QC123 </span></td></tr>
            <tr><td>批次</td><td><span>392</span></td></tr>
            <tr><td>企业名称</td><td><span>示例汽车制造有限公司</span></td></tr>
            <tr><td>产品商标</td><td><span>示例牌</span></td></tr>
            <tr><td>生产地址</td><td><span>示例市示例区工业路1号</span></td></tr>
            <tr><td>车辆型号</td><td><span>EX5000</span></td></tr>
            <tr><td>底盘型号及企业</td><td><span>DP100 / 示例底盘厂</span></td></tr>
            <tr><td>燃料种类</td><td>汽油</td></tr>
            <tr><td>排放依据标准</td><td><span>GB18352.6-2016</span></td></tr>
            <tr><td>发动机生产企业</td><td><span>示例动力</span></td></tr>
            <tr><td>发动机型号</td><td><span>EM20</span></td></tr>
            <tr><td>排量</td><td><span>1998</span></td></tr>
            <tr><td>停产日期</td><td><span>2027-01-01</span></td></tr>
        </table></body></html>"#;

    #[test]
    fn blocked_content_raises_captcha_recognition() {
        let html = "<html><body>访问行为验证</body></html>";
        assert!(matches!(
            ensure_not_blocked(html, DEFAULT_VERIFICATION_MARKER),
            Err(CrawlError::CaptchaRecognition)
        ));
        assert!(ensure_not_blocked(DETAIL_PAGE, DEFAULT_VERIFICATION_MARKER).is_ok());
    }

    #[test]
    fn extracts_labeled_table_cells() {
        let record = extract_record(DETAIL_PAGE, 7, "https://catalog/7");
        assert_eq!(record.seq, 7);
        assert_eq!(record.product_id, "QC123");
        assert_eq!(record.batch, "392");
        assert_eq!(record.company_name, "示例汽车制造有限公司");
        assert_eq!(record.product_trademark, "示例牌");
        assert_eq!(record.production_address, "示例市示例区工业路1号");
        assert_eq!(record.vehicle_model, "EX5000");
        assert_eq!(record.chassis_model_and_company, "DP100 / 示例底盘厂");
        assert_eq!(record.emission_standard, "GB18352.6-2016");
        // Engine rows share a label prefix; each must resolve independently.
        assert_eq!(record.engine_manufacturer, "示例动力");
        assert_eq!(record.engine_model, "EM20");
        assert_eq!(record.displacement, "1998");
        assert_eq!(record.production_end_date, "2027-01-01");
        // Value cells without a span fall back to the cell text.
        assert_eq!(record.fuel_type, "汽油");
        // Absent labels yield empty fields, not errors.
        assert_eq!(record.vin, "");
        assert_eq!(record.sales_end_date, "");
    }

    #[test]
    fn detail_images_are_resolved_against_the_page_url() {
        let record = extract_record(DETAIL_PAGE, 1, "https://catalog.example/detail/1");
        // Only the getPic endpoints count, made absolute, in document order.
        assert_eq!(
            record.image_urls,
            "https://catalog.example/detail/getPic?id=1&side=front;\
             https://catalog.example/detail/getPic?id=1&side=rear"
        );
    }
}
