//! Prompt templates. Output language is Spanish, matching the storefront.

pub fn product_description(product_name: &str, category: &str) -> String {
    format!(
        "Escribe una descripción técnica y comercial breve (máximo 25 palabras) para un producto de ferretería.\n\
         Producto: {product_name}.\n\
         Categoría: {category}.\n\
         Idioma: Español."
    )
}

pub fn sales_analysis(summary: &str) -> String {
    format!(
        "Actúa como un analista de negocios experto para una ferretería.\n\
         Analiza los siguientes datos de ventas resumidos y dame 3 consejos estratégicos breves para mejorar la rentabilidad o el stock.\n\
         Datos: {summary}\n\
         Formato: Lista de 3 puntos."
    )
}
