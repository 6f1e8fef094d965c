#[actix_web::main]
async fn main() -> std::io::Result<()> {
    survey_pdf_lib::run().await
}
